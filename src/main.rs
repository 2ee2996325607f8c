//! AgentBuddy Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;
use teloxide::{prelude::*, types::Update};
use teloxide::dispatching::UpdateHandler;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use AgentBuddy::{
    channels::{
        telegram::{account_from_user, activity_from_message},
        ChannelAdapter, TelegramAdapter,
    },
    config::Settings,
    handlers::{AgentBot, CommandRecognizer},
    models::ChannelAccount,
    services::{EventRelay, ServiceFactory},
    utils::logging,
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging; the guard flushes the log file on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", AgentBuddy::info());

    // Initialize bot
    let bot = Bot::new(&settings.bot.token);
    let bot_account = match bot.get_me().await {
        Ok(me) => account_from_user(&me.user),
        Err(e) => {
            warn!(error = %e, app_id = %settings.bot.app_id, "Could not fetch bot identity, using configured app id");
            ChannelAccount::new(settings.bot.app_id.clone(), None)
        }
    };
    let adapter: Arc<dyn ChannelAdapter> = Arc::new(TelegramAdapter::new(bot.clone()));

    // Initialize services
    info!("Initializing services...");
    let services = ServiceFactory::new(&settings, adapter.clone()).await?;

    let health = services.health_check().await;
    for issue in health.get_issues() {
        warn!(issue = %issue, "Service health issue");
    }

    let _pruner = services.event_bus.spawn_pruner(settings.events.prune_interval());
    let relay = EventRelay::new(
        services.agent_service.clone(),
        services.event_bus.clone(),
        settings.events.poll_interval(),
    )
    .spawn();

    let agent_bot = Arc::new(AgentBot::new(
        &settings,
        &services,
        adapter,
        Arc::new(CommandRecognizer::new()),
    ));
    info!(dialogs = agent_bot.registry().len(), "Dialogs registered");

    let handler = create_handler();

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![agent_bot, Arc::new(bot_account)])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd);
        })
        .enable_ctrlc_handler()
        .build();

    info!("AgentBuddy bot is ready!");
    dispatcher.dispatch().await;

    relay.abort();
    info!("AgentBuddy bot has been shut down.");

    Ok(())
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use teloxide::dispatching::UpdateFilterExt;

    Update::filter_message().endpoint(handle_message)
}

/// Turn a Telegram message into an activity and run it through the bot
async fn handle_message(
    msg: Message,
    agent_bot: Arc<AgentBot>,
    bot_account: Arc<ChannelAccount>,
) -> HandlerResult {
    let Some(activity) = activity_from_message(&msg, &bot_account) else {
        debug!(chat_id = msg.chat.id.0, "Ignoring message without usable content");
        return Ok(());
    };

    if let Err(e) = agent_bot.on_turn(activity, CancellationToken::new()).await {
        error!(chat_id = msg.chat.id.0, error = %e, "Error handling turn");
        return Err(e.into());
    }

    Ok(())
}
