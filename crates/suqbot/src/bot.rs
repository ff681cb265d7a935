//! Bot initialization and the command surface.

use anyhow::anyhow;
use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use suqcore::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "What I can do:")]
pub enum Command {
    #[command(description = "open the store")]
    Start,
    #[command(description = "browse the catalog")]
    Shop,
    #[command(description = "list your orders")]
    Orders,
    #[command(description = "cancel the current order")]
    Cancel,
}

/// Creates a Bot instance with custom or default API URL.
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.clone();
    if token.is_empty() {
        return Err(anyhow!("BOT_TOKEN environment variable not set"));
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow!("Invalid BOT_API_URL: {}", e))?;
        Bot::with_client(token, client).set_api_url(url)
    } else {
        Bot::with_client(token, client)
    };

    Ok(bot)
}

/// Registers the command list in the Telegram UI.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "open the store"),
        BotCommand::new("shop", "browse the catalog"),
        BotCommand::new("orders", "list your orders"),
        BotCommand::new("cancel", "cancel the current order"),
    ])
    .await?;

    Ok(())
}
