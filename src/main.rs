use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use arboard::Clipboard;
use clap::Parser;
use ratatui::DefaultTerminal;
use tokio::sync::watch;
use tracing::{info, warn};
use url::Url;

mod controller;
mod inputter;
mod logging;
mod model;
mod ui;

use contact_tv::domain::{ITEMS_PER_PAGE, LOCAL_PAGE_SIZE};
use contact_tv::export;
use contact_tv::{
    Account, HttpContactService, ListConfig, ListError, QueryParams, RouteData, RouteSynchronizer, Router,
};
use controller::Controller;
use model::{Model, Status};
use ui::TableUI;

/// Browse the contacts of a backend from the terminal.
#[derive(Parser, Debug)]
#[command(name = "ctv", version, about)]
struct Args {
    /// Base url of the backend
    #[arg(long, default_value = "http://localhost:8080/")]
    api_url: Url,

    /// Initial query string, e.g. `page=2&sort=nom,asc&filter[age.greaterThan]=30`
    #[arg(long, default_value = "")]
    query: String,

    /// Account the list is loaded for
    #[arg(long, default_value = "admin")]
    login: String,

    /// Contacts per server page
    #[arg(long, default_value_t = ITEMS_PER_PAGE)]
    page_size: u32,

    /// Rows per local page
    #[arg(long, default_value_t = LOCAL_PAGE_SIZE)]
    local_page_size: usize,

    /// Default sort of the list route, e.g. `nom,asc`
    #[arg(long)]
    default_sort: Option<String>,

    /// Use the route default sort when the query has none
    #[arg(long)]
    honor_default_sort: bool,

    /// Delimiter of csv exports and copied rows
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    #[arg(long, default_value = "ctv.log")]
    log_file: PathBuf,

    /// Fetch once, write the rows to this file and exit
    #[arg(long)]
    export: Option<String>,
}

impl Args {
    fn to_config(&self) -> ListConfig {
        let config = ListConfig::new(self.api_url.clone())
            .with_items_per_page(self.page_size)
            .with_local_page_size(self.local_page_size)
            .with_honor_route_default_sort(self.honor_default_sort)
            .with_export_delimiter(self.delimiter);
        match &self.default_sort {
            Some(sort) => config.with_route_default_sort(sort.clone()),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

async fn run(args: Args) -> Result<(), ListError> {
    logging::init_tracing(&args.log_file)?;
    let config = args.to_config();
    config.validate()?;
    info!("Starting ctv against {}", config.api_url);

    let service = Arc::new(HttpContactService::new(&config)?);
    let route = RouteData {
        default_sort: config.route_default_sort.clone(),
    };
    let router = Router::new(QueryParams::parse(&args.query), route);
    let mut sync = RouteSynchronizer::new(config.clone(), service, router);

    let (auth_tx, auth_rx) = watch::channel(None);
    sync.mount(auth_rx);
    auth_tx.send_replace(Some(Account::new(args.login.as_str())));

    if let Some(path) = args.export.as_deref() {
        return export_once(sync, path).await;
    }

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, sync, &config).await;
    ratatui::restore();
    result
}

async fn export_once(mut sync: RouteSynchronizer, path: &str) -> Result<(), ListError> {
    sync.settle().await;
    if let Some(e) = sync.take_error() {
        return Err(e);
    }
    let rows = sync.table().export_snapshot();
    let written = export::write_file(&rows, path, sync.config().export_delimiter)?;
    println!("Exported {} rows to {}", rows.len(), written.display());
    Ok(())
}

async fn event_loop(
    terminal: &mut DefaultTerminal,
    sync: RouteSynchronizer,
    config: &ListConfig,
) -> Result<(), ListError> {
    let clipboard = Clipboard::new()
        .map_err(|e| warn!("Clipboard unavailable: {e}"))
        .ok();
    let mut model = Model::init(sync, clipboard);
    let mut ui = TableUI::new();
    let controller = Controller::new();
    let frame_time = Duration::from_millis(config.event_poll_time);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        let idle = message.is_none();
        model.update(message)?;

        // Wait for responses only while no key is queued
        let wait = if idle { frame_time } else { Duration::ZERO };
        model.pump(wait).await;
    }

    model.sync_mut().teardown();
    Ok(())
}
