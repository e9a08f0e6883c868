use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vsh::resolve::SCRIPT_EXT;
use vsh::stdin::{spawn_copier, EofPolicy};
use vsh::vfs::{extension, normalize_path, resolve_path};
use vsh::{
    BlockingBuffer, Dispatcher, HostFs, HostRuntime, Resolver, ScriptReader, ShellBuilder,
    ShellError, SwitchableWriter, TerminalReader, ToolchainBuilder, Vfs,
};
use vsh_config::{LogFormat, VshConfig};

/// vsh - Command shell for a capability-scoped virtual filesystem
#[derive(Parser, Debug)]
#[command(name = "vsh", version, about)]
struct Args {
    /// Configuration file (replaces the default search)
    #[arg(long, env = "VSH_CONFIG")]
    config: Option<String>,

    /// Host directory backing the virtual root
    #[arg(long)]
    root: Option<PathBuf>,

    /// Execute command and exit
    #[arg(short = 'c', conflicts_with = "script")]
    command: Option<String>,

    /// Script file to execute (.sh)
    script: Option<String>,

    /// Arguments passed to the script as $1..$N
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, requires = "script")]
    script_args: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("vsh: {e}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> Result<i32, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => vsh_config::load_from_file(path)?,
        None => vsh_config::load().unwrap_or_else(|e| {
            eprintln!("vsh: failed to load config: {e}, using defaults");
            VshConfig::default()
        }),
    };
    init_logging(&config);

    let root = match args.root {
        Some(root) => root,
        None => vsh_config::expand_home(&config.root.path)?,
    };
    let host_fs = Arc::new(HostFs::open(&root)?);
    let root = host_fs.root().to_path_buf();
    let cwd = initial_cwd(&host_fs);
    let vfs: Arc<dyn Vfs> = host_fs;
    tracing::debug!(root = %root.display(), cwd = %cwd, "Opened virtual root");

    let router = Arc::new(SwitchableWriter::new(BlockingBuffer::new()));
    let stdin = io::stdin();
    let policy = EofPolicy::for_source(&stdin);
    let _copier = spawn_copier(stdin, router.clone(), policy)?;

    let builder = Arc::new(ToolchainBuilder::from_config(vfs.clone(), &config.build));
    let runtime = Arc::new(HostRuntime::from_config(vfs.clone(), root.clone(), &config.runtime)?);
    let resolver = Resolver::new(vfs.clone(), builder);
    let dispatcher = Dispatcher::new(resolver, runtime, router.clone());

    let shell = ShellBuilder::new(vfs.clone(), dispatcher)
        .envs(process_env())
        .cwd(&cwd)
        .prompt(&config.shell.prompt);

    if let Some(command) = args.command {
        let mut shell = shell.build();
        return Ok(shell.run(&mut ScriptReader::from_source(&command)).await);
    }

    if let Some(script) = args.script {
        if extension(&script) != Some(SCRIPT_EXT) {
            return Err(ShellError::Usage("script argument must be a '.sh' file".to_string()).into());
        }
        let source = read_script(vfs.as_ref(), &cwd, &script)?;

        let mut positional = vec![script];
        positional.extend(args.script_args);
        let mut shell = shell.script_mode(true).positional(positional).build();
        return Ok(shell.run(&mut ScriptReader::from_source(&source)).await);
    }

    if config.shell.banner {
        println!("vsh v{} (root: {})", env!("CARGO_PKG_VERSION"), root.display());
        println!("Type 'help' for built-in commands, 'exit' to quit.");
        println!();
    }

    let mut reader = TerminalReader::new(router.default_buffer().clone(), Box::new(io::stdout()));
    let mut shell = shell.build();
    Ok(shell.run(&mut reader).await)
}

fn init_logging(config: &VshConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.logging.filter.is_empty() {
            EnvFilter::new(config.logging.level.as_str())
        } else {
            EnvFilter::new(&config.logging.filter)
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(io::stderr))
            .init(),
    }
}

/// Process environment, skipping entries that are not valid UTF-8.
fn process_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
}

/// `VSH_CWD` from a parent shell, else the host working directory when it
/// lies under the root, else `/`.
fn initial_cwd(host_fs: &HostFs) -> String {
    if let Ok(cwd) = std::env::var("VSH_CWD") {
        let cwd = normalize_path(&cwd);
        if host_fs.is_dir(&cwd) {
            return cwd;
        }
    }

    std::env::current_dir()
        .and_then(|dir| dir.canonicalize())
        .ok()
        .and_then(|dir| host_fs.virtual_path(&dir))
        .unwrap_or_else(|| "/".to_string())
}

/// A script path names a virtual file when one exists, else a host file.
fn read_script(vfs: &dyn Vfs, cwd: &str, script: &str) -> Result<String, Box<dyn std::error::Error>> {
    let virtual_path = resolve_path(cwd, script);
    let bytes = if vfs.exists(&virtual_path) {
        vfs.read(&virtual_path)?
    } else {
        std::fs::read(script).map_err(|e| format!("cannot read '{script}': {e}"))?
    };
    Ok(String::from_utf8(bytes)?)
}
