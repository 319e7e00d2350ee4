use camino::Utf8PathBuf;
use clap::Parser;

/// Command-line interface of the console shell
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mcm-compressor",
    version,
    about = "Compress a folder with the MCM archiver and follow its progress"
)]
pub struct Cli {
    /// Folder to compress
    pub input_dir: Utf8PathBuf,

    /// Archive to write (default: <parent>/<folder-name>.<extension>)
    #[arg(short, long)]
    pub output: Option<Utf8PathBuf>,

    /// Compression profile from the configuration (default: the configured default)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Compressor executable, overriding the configured tool path
    #[arg(long)]
    pub tool: Option<String>,

    /// Directory holding Compressor Config.yaml
    #[arg(long, default_value = crate::config::DEFAULT_CONFIG_DIR)]
    pub config_dir: Utf8PathBuf,

    /// Verbose logging, also mirrored to stderr
    #[arg(short, long)]
    pub debug: bool,

    /// Do not report progress to the taskbar
    #[arg(long)]
    pub no_taskbar: bool,
}
