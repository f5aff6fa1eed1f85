//! Command-line client for the review marketplace.

mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use market_client::{
    Action, Catalog, ClientConfig, ClientError, ClientMetrics, ImageSource, LifecycleController,
    LifecycleEvent, ListViewController, ProductDraft, ProductPublisher, Session, SortKey,
    ViewParams,
};
use market_gateway::{ImageFile, JsonRpcGateway, PinataImageHost, Receipt};
use market_types::{Address, Clock, FeedbackId, FeedbackStatus, ProductId, SystemClock};
use market_utils::LogFormat;

#[derive(Parser)]
#[command(name = "market", about = "Browse, review and moderate marketplace listings")]
struct Cli {
    /// Signing bridge endpoint.
    #[arg(long, env = "MARKET_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Marketplace contract address.
    #[arg(long, env = "MARKET_CONTRACT")]
    contract: Option<Address>,

    /// Wallet account to act as. Required for every write.
    #[arg(long, env = "MARKET_ACCOUNT")]
    account: Option<Address>,

    /// Host serving pinned images, e.g. "ipfs.io".
    #[arg(long, env = "MARKET_IPFS_GATEWAY")]
    ipfs_gateway: Option<String>,

    /// Pinata API token, used to pin listing images.
    #[arg(long, env = "MARKET_PINATA_JWT", hide_env_values = true)]
    pinata_jwt: Option<String>,

    /// Items per page in listings.
    #[arg(long, env = "MARKET_PAGE_SIZE")]
    page_size: Option<usize>,

    /// Seconds to wait for a transaction to confirm.
    #[arg(long, env = "MARKET_CONFIRMATION_TIMEOUT")]
    confirmation_timeout: Option<u64>,

    /// Log format: "human" or "json".
    #[arg(long, env = "MARKET_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "MARKET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print Prometheus metrics to stderr on exit.
    #[arg(long, env = "MARKET_ENABLE_METRICS")]
    metrics: bool,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "MARKET_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Browse and manage product listings.
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Review products and moderate feedback on your own.
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },
    /// Reward pool status and claims.
    Rewards {
        #[command(subcommand)]
        action: RewardsAction,
    },
    /// Listing statistics for an owner (defaults to --account).
    Profile { owner: Option<Address> },
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(clap::Args)]
struct ListArgs {
    /// Case-insensitive text filter.
    #[arg(long, default_value = "")]
    query: String,

    /// Minimum average rating, 0-5.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=5))]
    min_rating: Option<u8>,

    /// newest, oldest, rating, reviews or name.
    #[arg(long, default_value = "newest")]
    sort: SortKey,

    #[arg(long, default_value_t = 1)]
    page: usize,
}

impl ListArgs {
    fn params(&self, status: Option<FeedbackStatus>) -> ViewParams {
        ViewParams {
            query: self.query.clone(),
            min_rating: self.min_rating,
            status,
            sort: self.sort,
        }
    }
}

#[derive(clap::Subcommand)]
enum ProductsAction {
    /// List every product; inactive listings are marked.
    List(ListArgs),
    /// Products listed by --account.
    Mine(ListArgs),
    /// A product with its feedback.
    Show { id: u64 },
    /// List a new product. Pays the listing fee.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        url: String,
        /// Local image to pin before listing.
        #[arg(long, conflicts_with = "image_url")]
        image: Option<PathBuf>,
        /// Already hosted image.
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Take one of your products off the market.
    Deactivate { id: u64 },
}

#[derive(clap::Subcommand)]
enum FeedbackAction {
    /// Feedback left on a product.
    List {
        product: u64,
        /// pending, approved or rejected.
        #[arg(long)]
        status: Option<FeedbackStatus>,
        #[command(flatten)]
        view: ListArgs,
    },
    /// Review a product.
    Submit {
        product: u64,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        #[arg(long)]
        comment: String,
    },
    /// Feedback awaiting your moderation.
    Pending(ListArgs),
    /// Approve feedback on one of your products. Pays the reviewer.
    Approve { id: u64 },
    /// Reject feedback on one of your products.
    Reject {
        id: u64,
        #[arg(long)]
        reason: String,
    },
}

#[derive(clap::Subcommand)]
enum RewardsAction {
    /// Pool status, and the balance of --account when given.
    Show,
    /// Withdraw the rewards credited to --account.
    Claim,
}

/// Merge the optional config file with flag and env overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => load_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &cli.gateway_url {
        config.gateway_url = url.clone();
    }
    if cli.contract.is_some() {
        config.contract_address = cli.contract;
    }
    if let Some(host) = &cli.ipfs_gateway {
        config.ipfs_gateway = host.clone();
    }
    if cli.pinata_jwt.is_some() {
        config.pinata_jwt = cli.pinata_jwt.clone();
    }
    config.page_size = cli.page_size.unwrap_or(config.page_size);
    config.confirmation_timeout_secs = cli
        .confirmation_timeout
        .unwrap_or(config.confirmation_timeout_secs);
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.enable_metrics |= cli.metrics;
    config.validate()?;
    Ok(config)
}

fn load_file(path: &Path) -> anyhow::Result<ClientConfig> {
    ClientConfig::from_toml_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

fn content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => return None,
    })
}

async fn read_image(path: &Path) -> anyhow::Result<ImageFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let file = ImageFile::new(name, bytes);
    Ok(match content_type(path) {
        Some(mime) => file.with_content_type(mime),
        None => file,
    })
}

fn shown_config(config: &ClientConfig) -> String {
    let mut shown = config.clone();
    if shown.pinata_jwt.is_some() {
        shown.pinata_jwt = Some("<redacted>".to_string());
    }
    shown.to_toml_string()
}

struct App {
    config: ClientConfig,
    session: Session,
    catalog: Arc<Catalog>,
    lifecycle: LifecycleController,
    metrics: Arc<ClientMetrics>,
    clock: SystemClock,
}

impl App {
    fn connect(config: ClientConfig, account: Option<Address>) -> anyhow::Result<Self> {
        let gateway = JsonRpcGateway::new(config.gateway_url.clone(), config.contract()?)?
            .with_poll_interval(config.poll_interval());
        let metrics = Arc::new(ClientMetrics::new());
        let catalog = Arc::new(Catalog::new(Arc::new(gateway)).with_metrics(metrics.clone()));
        let lifecycle =
            LifecycleController::from_config(catalog.gateway().clone(), catalog.clone(), &config)
                .with_metrics(metrics.clone());
        lifecycle.subscribe(Box::new(|event: &LifecycleEvent| {
            eprintln!("{}", render::event(event))
        }));

        tracing::debug!(
            gateway = %config.gateway_url,
            account = ?account,
            "client ready"
        );
        Ok(Self {
            session: account.map_or_else(Session::disconnected, Session::connected),
            config,
            catalog,
            lifecycle,
            metrics,
            clock: SystemClock,
        })
    }

    fn account(&self) -> anyhow::Result<Address> {
        Ok(self.session.require_account()?)
    }

    fn list<T: market_client::Listable + Clone>(
        &self,
        items: Vec<T>,
        params: ViewParams,
        page: usize,
    ) -> ListViewController<T> {
        let mut list = ListViewController::new(self.config.page_size).with_items(items);
        list.set_params(params);
        list.set_page(page);
        list
    }

    /// Check the action against fresh ledger state, then run it to settlement.
    async fn write(&self, action: Action) -> anyhow::Result<Receipt> {
        let account = self.account()?;
        let known = self.catalog.known_state(&action, &account).await?;
        match self.lifecycle.execute(&self.session, action, &known).await {
            Ok(receipt) => Ok(receipt),
            Err(ClientError::Timeout(after)) => bail!(
                "no confirmation after {}s; the transaction may still confirm, check again later",
                after.as_secs()
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn run(&self, command: Command) -> anyhow::Result<()> {
        let now = self.clock.now();
        match command {
            Command::Products { action } => match action {
                ProductsAction::List(args) => {
                    let products = self.catalog.load_products().await?;
                    let list = self.list(products, args.params(None), args.page);
                    println!("{}", render::page(&list.view(), |p| render::product_line(p, now)));
                }
                ProductsAction::Mine(args) => {
                    let account = self.account()?;
                    let products = self.catalog.load_owner_products(&account).await?;
                    let list = self.list(products, args.params(None), args.page);
                    println!("{}", render::page(&list.view(), |p| render::product_line(p, now)));
                }
                ProductsAction::Show { id } => {
                    let product = self.catalog.load_product(ProductId(id)).await?;
                    let feedback = self.catalog.load_feedback(product.id).await?;
                    println!("{}", render::product_detail(&product, &feedback, now));
                }
                ProductsAction::Create {
                    name,
                    description,
                    url,
                    image,
                    image_url,
                } => {
                    let image = match (image, image_url) {
                        (Some(path), _) => ImageSource::File(read_image(&path).await?),
                        (None, Some(url)) => ImageSource::Url(url),
                        (None, None) => ImageSource::None,
                    };
                    let jwt = self.config.pinata_jwt.clone().unwrap_or_default();
                    if matches!(image, ImageSource::File(_)) && jwt.is_empty() {
                        bail!("pinata_jwt is required to upload an image");
                    }
                    let images = PinataImageHost::new(jwt)?
                        .with_upload_url(self.config.pinata_upload_url.clone())
                        .with_gateway_host(self.config.ipfs_gateway.clone());
                    let publisher = ProductPublisher::new(
                        self.lifecycle.clone(),
                        self.catalog.clone(),
                        Arc::new(images),
                    )
                    .with_fee(self.config.creation_fee_override()?);
                    let draft = ProductDraft {
                        name,
                        description,
                        product_url: url,
                        image,
                    };
                    let published = publisher.publish(&self.session, &draft).await?;
                    println!(
                        "listed for {}; {}",
                        render::ether(published.fee),
                        render::receipt(&published.receipt)
                    );
                    if !published.image_url.is_empty() {
                        println!("image: {}", published.image_url);
                    }
                }
                ProductsAction::Deactivate { id } => {
                    let receipt = self
                        .write(Action::DeactivateProduct {
                            product_id: ProductId(id),
                        })
                        .await?;
                    println!("{}", render::receipt(&receipt));
                }
            },
            Command::Feedback { action } => match action {
                FeedbackAction::List {
                    product,
                    status,
                    view,
                } => {
                    let feedback = self.catalog.load_feedback(ProductId(product)).await?;
                    let list = self.list(feedback, view.params(status), view.page);
                    println!("{}", render::page(&list.view(), |r| render::feedback_line(r, now)));
                }
                FeedbackAction::Submit {
                    product,
                    rating,
                    comment,
                } => {
                    let receipt = self
                        .write(Action::SubmitFeedback {
                            product_id: ProductId(product),
                            comment,
                            rating,
                        })
                        .await?;
                    println!("{}", render::receipt(&receipt));
                }
                FeedbackAction::Pending(args) => {
                    let account = self.account()?;
                    let pending = self.catalog.load_pending(&account).await?;
                    let list = self.list(pending, args.params(None), args.page);
                    println!("{}", render::page(&list.view(), |r| render::feedback_line(r, now)));
                }
                FeedbackAction::Approve { id } => {
                    let receipt = self
                        .write(Action::ApproveFeedback {
                            feedback_id: FeedbackId(id),
                        })
                        .await?;
                    println!("{}", render::receipt(&receipt));
                }
                FeedbackAction::Reject { id, reason } => {
                    let receipt = self
                        .write(Action::RejectFeedback {
                            feedback_id: FeedbackId(id),
                            reason,
                        })
                        .await?;
                    println!("{}", render::receipt(&receipt));
                }
            },
            Command::Rewards { action } => match action {
                RewardsAction::Show => {
                    let pool = self.catalog.reward_pool().await?;
                    println!("{}", render::pool(&pool));
                    if let Some(account) = self.session.account() {
                        let balance = self.catalog.load_rewards(&account).await?;
                        println!("claimable:  {}", render::ether(balance));
                    }
                }
                RewardsAction::Claim => {
                    let receipt = self.write(Action::ClaimRewards).await?;
                    println!("{}", render::receipt(&receipt));
                }
            },
            Command::Profile { owner } => {
                let owner = match owner {
                    Some(owner) => owner,
                    None => self.account()?,
                };
                let stats = self.catalog.owner_stats(&owner).await?;
                println!("{}", render::owner_stats(&owner, &stats, now));
            }
            Command::Config => print!("{}", shown_config(&self.config)),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let format: LogFormat = config
        .log_format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    market_utils::init_logging(format, &config.log_level);

    // Needs no contract, so it works before the client is configured.
    if matches!(cli.command, Command::Config) {
        print!("{}", shown_config(&config));
        return Ok(());
    }

    let app = App::connect(config, cli.account)?;
    let result = app.run(cli.command).await;
    if app.config.enable_metrics {
        eprint!("{}", app.metrics.encode_text());
    }
    result
}
