//! Headless reminder daemon.
//!
//! Wires the engine together the way a host app would: durable store,
//! messenger channel, background scheduler with the logging delivery ports,
//! and a foreground scheduler that builds and delegates tomorrow's plan.

use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;

use sipnote_reminders::background::BackgroundScheduler;
use sipnote_reminders::config;
use sipnote_reminders::delivery::LogPresenter;
use sipnote_reminders::foreground::ForegroundScheduler;
use sipnote_reminders::messenger::Messenger;
use sipnote_reminders::store::ScheduleStore;
use sipnote_reminders::timer::TokioTimer;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let user_id = std::env::args().nth(1).unwrap_or_else(|| "local".to_string());

    let settings = match config::load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Falling back to default settings: {}", e);
            Default::default()
        }
    };

    let store = match ScheduleStore::open() {
        Ok(store) => Some(store),
        Err(e) => {
            log::warn!("Schedule store unavailable: {}. In-memory timers only.", e);
            None
        }
    };

    let presenter = Arc::new(LogPresenter);
    let timer = Arc::new(TokioTimer);

    let (messenger, receiver) = Messenger::channel();
    let background = Arc::new(BackgroundScheduler::new(
        store,
        settings.clone(),
        presenter.clone(),
        timer.clone(),
    ));
    let loop_handle = background.spawn(receiver);

    let foreground = Arc::new(ForegroundScheduler::new(
        messenger,
        presenter,
        timer,
    ));

    let mut rng = rand::rngs::StdRng::from_rng(&mut rand::rng());
    foreground.schedule_daily_plan(&settings, &user_id, Utc::now(), &mut rng);
    log::info!("Scheduled tomorrow's plan for user '{}'", user_id);

    if let Err(e) = loop_handle.await {
        log::error!("Background scheduler loop failed: {}", e);
    }
}
