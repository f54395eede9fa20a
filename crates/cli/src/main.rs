use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

use adx_bidder::{BiddingEngine, CampaignStore};
use adx_core::{
    AppConfig, Campaign, CampaignStatus, ConfigLoader, Creative, DeviceType, Targeting,
};
use adx_exchange::{AuctionEngine, BidSource, BidderGateway, WorkflowOrchestrator};
use adx_rpc::{HealthMonitor, PeerClient, ServiceRegistry};
use adx_web_api::{ApiServer, BidderState, ExchangeState};

#[derive(Parser)]
#[command(name = "adx", about = "Real-time ad exchange services", version)]
struct Cli {
    /// Configuration profile overlay (config/Config.<profile>.toml)
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the exchange: auctions, workflows, stats
    Exchange,
    /// Serve a bidder: bids, win notices, campaign management
    Bidder {
        /// Seed demo campaigns on startup
        #[arg(long)]
        seed: bool,
    },
    /// Run demo workflows in process and print the results
    Demo {
        /// Number of workflow runs
        #[arg(long, default_value_t = 3)]
        runs: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match cli.profile.as_deref() {
        Some(profile) => ConfigLoader::load_with_profile(profile)?,
        None => ConfigLoader::load()?,
    };

    match cli.command {
        Commands::Exchange => run_exchange(config).await,
        Commands::Bidder { seed } => run_bidder(config, seed).await,
        Commands::Demo { runs } => run_demo(config, runs).await,
    }
}

/// Builds the auction engine and orchestrator from configured peers.
fn build_exchange(config: &AppConfig) -> Result<(Arc<AuctionEngine>, Arc<WorkflowOrchestrator>)> {
    let engine = Arc::new(AuctionEngine::new("adx-001", config.auction.clone()));
    for peer in &config.peers.bidders {
        let client = PeerClient::new(&peer.id, &peer.url, &config.rpc)?;
        engine.register_source(Arc::new(BidderGateway::new(client)) as Arc<dyn BidSource>);
    }

    let mut orchestrator = WorkflowOrchestrator::new(Arc::clone(&engine));
    if let Some(url) = &config.peers.profile_service {
        orchestrator =
            orchestrator.with_profile_service(PeerClient::new("profile-service", url, &config.rpc)?);
    }
    if let Some(url) = &config.peers.supply_service {
        orchestrator =
            orchestrator.with_supply_service(PeerClient::new("supply-service", url, &config.rpc)?);
    }
    Ok((engine, Arc::new(orchestrator)))
}

fn build_registry(config: &AppConfig) -> Arc<ServiceRegistry> {
    let registry = Arc::new(ServiceRegistry::new());
    for peer in &config.peers.bidders {
        registry.register(&peer.id, &peer.url);
    }
    if let Some(url) = &config.peers.profile_service {
        registry.register("profile-service", url);
    }
    if let Some(url) = &config.peers.supply_service {
        registry.register("supply-service", url);
    }
    registry
}

async fn run_exchange(config: AppConfig) -> Result<()> {
    let (engine, orchestrator) = build_exchange(&config)?;
    let registry = build_registry(&config);

    let monitor = HealthMonitor::new(Arc::clone(&registry), config.monitor.clone())?;
    let _monitor_tx = monitor.spawn();

    tracing::info!(
        bidders = engine.source_count(),
        "starting exchange service"
    );
    ApiServer::exchange(ExchangeState {
        engine,
        orchestrator,
        registry,
    })
    .serve(&config.exchange_server.bind_addr())
    .await
}

async fn run_bidder(config: AppConfig, seed: bool) -> Result<()> {
    let store = Arc::new(CampaignStore::new());
    if seed {
        for campaign in demo_campaigns() {
            let id = campaign.id.clone();
            if let Err(e) = store.insert(campaign) {
                tracing::warn!(campaign = %id, error = %e, "seed campaign skipped");
            }
        }
        tracing::info!(campaigns = store.list().len(), "demo campaigns seeded");
    }

    let engine = Arc::new(BiddingEngine::new(config.bidding.clone(), store));
    let profile_client = match &config.peers.profile_service {
        Some(url) => Some(Arc::new(PeerClient::new("profile-service", url, &config.rpc)?)),
        None => None,
    };

    tracing::info!(bidder = engine.bidder_id(), "starting bidder service");
    ApiServer::bidder(BidderState {
        engine,
        profile_client,
    })
    .serve(&config.bidder_server.bind_addr())
    .await
}

async fn run_demo(config: AppConfig, runs: u32) -> Result<()> {
    let (engine, orchestrator) = build_exchange(&config)?;

    for i in 1..=runs {
        let run = orchestrator.execute(None).await;
        tracing::info!(run = i, status = ?run.status, "demo run finished");
        println!("{}", serde_json::to_string_pretty(&run)?);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&orchestrator.stats_snapshot())?
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&engine.stats().snapshot())?
    );
    Ok(())
}

fn demo_campaigns() -> Vec<Campaign> {
    let now = Utc::now();
    vec![
        Campaign {
            id: "camp-001".to_string(),
            name: "Mobile Gadget Launch".to_string(),
            advertiser_id: "adv-001".to_string(),
            budget: dec!(1000.00),
            spent: Decimal::ZERO,
            targeting: Targeting {
                device_types: Some(vec![DeviceType::Mobile, DeviceType::Tablet]),
                countries: Some(vec!["US".to_string(), "GB".to_string()]),
                interests: None,
                segments: None,
            },
            creative: Creative {
                title: "The new gadget is here".to_string(),
                description: Some("Preorder today".to_string()),
                image_url: Some("https://cdn.example.com/gadget.png".to_string()),
            },
            status: CampaignStatus::Active,
            created_at: now,
            updated_at: now,
        },
        Campaign {
            id: "camp-002".to_string(),
            name: "Evergreen Brand".to_string(),
            advertiser_id: "adv-002".to_string(),
            budget: dec!(500.00),
            spent: Decimal::ZERO,
            targeting: Targeting::default(),
            creative: Creative {
                title: "A brand you can trust".to_string(),
                description: None,
                image_url: Some("https://cdn.example.com/brand.png".to_string()),
            },
            status: CampaignStatus::Active,
            created_at: now,
            updated_at: now,
        },
    ]
}
