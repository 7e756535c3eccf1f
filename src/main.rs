use bitbucket_build_status::credentials::{CredentialStore, list_credential_ids};
use bitbucket_build_status::logging::{BuildListener, ConsoleListener, FileLogger, setup_logging};
use bitbucket_build_status::transport::HttpTransport;
use bitbucket_build_status::{
    AppConfig, BITBUCKET_HOST, BuildInfo, BuildOutcome, ScmBinding, StatusNotifier, load_config,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "build_status.toml";

#[derive(Parser, Debug)]
#[command(name = "bitbucket-build-status", version)]
#[command(about = "Report a finished CI build to Bitbucket commit statuses")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "STATUS_NOTIFIER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Also write the application log to daily files in this directory
    #[arg(long, global = true, env = "LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Post the build result for the built commit. Always exits successfully.
    Notify(NotifyArgs),
    /// Print the credential ids usable for bitbucket.org
    ListCredentials,
}

#[derive(Args, Debug)]
struct NotifyArgs {
    /// Build result: SUCCESS, FAILURE, UNSTABLE, ABORTED or NOT_BUILT
    #[arg(long, env = "BUILD_RESULT")]
    result: Option<String>,

    #[arg(long, env = "BUILD_NUMBER")]
    number: Option<String>,

    /// Build page relative to the CI root URL, e.g. job/widgets/42/
    #[arg(long, env = "BUILD_RELATIVE_URL", default_value = "")]
    relative_url: String,

    /// Source control used by the build
    #[arg(long, env = "SCM_KIND", default_value = "git")]
    scm: String,

    /// Repository remote URLs; the first one is reported against
    #[arg(long = "remote", env = "GIT_URL", value_delimiter = ',')]
    remotes: Vec<String>,

    /// SHA-1 of the last built revision
    #[arg(long, env = "GIT_COMMIT")]
    commit: Option<String>,

    /// Overrides notifier.credentials_id from the config file
    #[arg(long, env = "BITBUCKET_CREDENTIALS_ID")]
    credentials_id: Option<String>,

    /// Overrides host.root_url from the config file
    #[arg(long, env = "JENKINS_URL")]
    root_url: Option<String>,
}

impl NotifyArgs {
    /// Missing or unparseable build inputs are reported, not raised as usage errors.
    fn build_info(&self) -> Result<BuildInfo, String> {
        let result = self
            .result
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or("No build result given (set BUILD_RESULT or --result).")?;
        let outcome = match result.parse::<BuildOutcome>() {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        };
        let number = self
            .number
            .as_deref()
            .ok_or("No build number given (set BUILD_NUMBER or --number).")?;
        let number = number
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("Invalid build number '{}': {}", number, e))?;
        Ok(BuildInfo::new(number, self.relative_url.clone(), outcome))
    }
}

fn is_notify_invocation<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().skip(1).any(|arg| arg.as_ref() == "notify")
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if !e.use_stderr() || !is_notify_invocation(
                std::env::args_os().map(|arg| arg.to_string_lossy().into_owned()),
            ) {
                e.exit();
            }
            // A usage error must not fail the build that invoked `notify`.
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let file_logger = cli.log_dir.clone().map(FileLogger::new);
    let _guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up file logging: {}", e);
            setup_logging(None).ok().flatten()
        }
    };
    info!("Using config at {:?}", cli.config);

    match cli.command {
        Commands::Notify(args) => {
            run_notify(&cli.config, args, &mut ConsoleListener);
            ExitCode::SUCCESS
        }
        Commands::ListCredentials => match load_config(&cli.config) {
            Ok(config) => {
                for id in list_credential_ids(&config.credential_store(), BITBUCKET_HOST) {
                    println!("{}", if id.is_empty() { "- none -" } else { id.as_str() });
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        },
    }
}

/// Problems are reported to `listener` and never turned into a failing exit code.
fn run_notify(config_path: &Path, args: NotifyArgs, listener: &mut dyn BuildListener) {
    let build = match args.build_info() {
        Ok(build) => build,
        Err(message) => {
            error!("{}", message);
            listener.error(&message);
            return;
        }
    };

    let mut config: AppConfig = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            listener.error(&e.to_string());
            return;
        }
    };
    config.apply_overrides(args.credentials_id, args.root_url);

    let transport = match HttpTransport::new(config.host.proxy.as_ref(), config.host.timeout()) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = ?e, "Failed to create HTTP client");
            listener.error(&e.to_string());
            return;
        }
    };

    let store: CredentialStore = config.credential_store();
    let mut notifier =
        StatusNotifier::new(config.notifier.credentials_id.clone(), store, transport);
    if let Some(api_url) = &config.notifier.api_url {
        notifier = notifier.with_api_base_url(api_url.clone());
    }

    let scm = ScmBinding::from_kind(&args.scm, args.remotes, args.commit);
    notifier.notify(&build, &scm, &config.host, listener);
}
