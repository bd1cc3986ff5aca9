use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use picpick_archive::TargetFormat;
use picpick_core::{HarvestConfig, Session};
use picpick_resource::ContentHash;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn cli() -> Command {
    Command::new("picpick")
        .version(picpick_core::VERSION)
        .about("Collect the images of a web page into a zip archive")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("list")
                .about("Scan a page once and print its catalog as JSON")
                .arg(Arg::new("source").required(true).help("HTML file path or http(s) URL")),
        )
        .subcommand(
            Command::new("archive")
                .about("Scan a page once and write the selected images into a zip")
                .arg(Arg::new("source").required(true).help("HTML file path or http(s) URL"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_parser(value_parser!(PathBuf))
                        .help("Archive path (defaults to the configured archive name)"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_parser(value_parser!(TargetFormat))
                        .help("Convert every image to png, jpeg, webp, gif or bmp"),
                )
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Encrypt archive entries with this password"),
                )
                .arg(
                    Arg::new("filter")
                        .long("filter")
                        .value_parser(value_parser!(Regex))
                        .help("Only archive resources whose URI matches this regex"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<HarvestConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => HarvestConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(HarvestConfig::default()),
    }
}

/// Options of the `archive` subcommand
#[derive(Debug, Default)]
struct ArchiveArgs {
    output: Option<PathBuf>,
    format: Option<TargetFormat>,
    password: Option<String>,
    filter: Option<Regex>,
}

impl ArchiveArgs {
    fn from_matches(args: &ArgMatches) -> Self {
        Self {
            output: args.get_one::<PathBuf>("output").cloned(),
            format: args.get_one::<TargetFormat>("format").copied(),
            password: args.get_one::<String>("password").cloned(),
            filter: args.get_one::<Regex>("filter").cloned(),
        }
    }
}

async fn scan(source: &str, config: HarvestConfig) -> Result<Session> {
    let session = Session::open(source, config)
        .await
        .with_context(|| format!("opening {source}"))?;
    session.refresh().await.context("scanning page")?;
    Ok(session)
}

async fn list(source: &str, config: HarvestConfig) -> Result<String> {
    let session = scan(source, config).await?;
    let snapshot = session.catalog().snapshot();
    let report = serde_json::json!({
        "url": snapshot.url,
        "imglist": snapshot.items,
        "bad_uris": snapshot.bad_uris,
    });
    session.shutdown().await;
    Ok(serde_json::to_string_pretty(&report)?)
}

async fn archive(source: &str, config: HarvestConfig, args: ArchiveArgs) -> Result<(PathBuf, ContentHash)> {
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(config.archive.file_name()));
    let session = scan(source, config).await?;

    let selected = session
        .select_where(|record| args.filter.as_ref().is_none_or(|re| re.is_match(record.uri.as_str())))
        .await?;
    tracing::info!(selected, "selection made");
    if let Some(password) = args.password {
        session.catalog().set_password(password).await?;
    }

    let receipt = session.build_archive(args.format).await.context("building archive")?;
    let bytes = session
        .archive_bytes(&receipt)
        .context("archive output released before it was written")?;
    write_output(&output, &bytes).await?;
    tracing::info!(
        path = %output.display(),
        entries = receipt.entries.len(),
        digest = %receipt.digest.short(),
        "archive written"
    );

    session.shutdown().await;
    Ok((output, receipt.digest))
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("list", args)) => {
            let source = args.get_one::<String>("source").context("missing source")?;
            println!("{}", list(source, config).await?);
        }
        Some(("archive", args)) => {
            let source = args.get_one::<String>("source").context("missing source")?;
            let (path, digest) = archive(source, config, ArchiveArgs::from_matches(args)).await?;
            println!("{digest}  {}", path.display());
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use picpick_test_utils::{gif_bytes, png_bytes};
    use std::io::Cursor;

    fn data_uri(mime: &str, bytes: &[u8]) -> String {
        format!("data:{mime};base64,{}", base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// A page on disk whose images are all inline, so no network is needed
    fn page(dir: &Path) -> PathBuf {
        let html = format!(
            r#"<html><body><img src="{}"><div style="background-image: url('{}')"></div></body></html>"#,
            data_uri("image/png", &png_bytes(2, 2, [0, 0, 255, 255])),
            data_uri("image/gif", &gif_bytes(3, 3)),
        );
        let path = dir.join("page.html");
        std::fs::write(&path, html).unwrap();
        path
    }

    fn quiet() -> HarvestConfig {
        HarvestConfig::new().with_scan_interval(std::time::Duration::from_secs(600))
    }

    #[test]
    fn parses_archive_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "picpick", "--log-json", "archive", "page.html", "-o", "out.zip", "--format", "jpg", "--filter", "png$",
            ])
            .unwrap();
        assert!(matches.get_flag("log-json"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "archive");
        let parsed = ArchiveArgs::from_matches(args);
        assert_eq!(parsed.output, Some(PathBuf::from("out.zip")));
        assert_eq!(parsed.format, Some(TargetFormat::Jpeg));
        assert!(parsed.filter.unwrap().is_match("a.png"));

        assert!(cli().try_get_matches_from(["picpick", "archive", "p", "--format", "tga"]).is_err());
        assert!(cli().try_get_matches_from(["picpick"]).is_err());
    }

    #[tokio::test]
    async fn list_prints_both_resources() {
        let dir = tempfile::tempdir().unwrap();
        let source = page(dir.path());
        let json = list(source.to_str().unwrap(), quiet()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["imglist"].as_object().unwrap().len(), 2);
        assert!(value["url"].as_str().unwrap().starts_with("file://"));
    }

    #[tokio::test]
    async fn archive_writes_a_filtered_zip() {
        let dir = tempfile::tempdir().unwrap();
        let source = page(dir.path());
        let out = dir.path().join("nested").join("images.zip");

        let args = ArchiveArgs {
            output: Some(out.clone()),
            filter: Some(Regex::new("^data:image/gif").unwrap()),
            ..ArchiveArgs::default()
        };
        let (written, digest) = archive(source.to_str().unwrap(), quiet(), args).await.unwrap();
        assert_eq!(written, out);

        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(digest, ContentHash::compute(&bytes));
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 1);
        assert!(zip.by_index(0).unwrap().name().ends_with(".gif"));
    }

    #[tokio::test]
    async fn archive_with_password_and_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let source = page(dir.path());
        let out = dir.path().join("locked.zip");

        let args = ArchiveArgs {
            output: Some(out.clone()),
            format: Some(TargetFormat::Bmp),
            password: Some("pw".into()),
            ..ArchiveArgs::default()
        };
        archive(source.to_str().unwrap(), quiet(), args).await.unwrap();

        let mut zip = zip::ZipArchive::new(Cursor::new(std::fs::read(&out).unwrap())).unwrap();
        assert_eq!(zip.len(), 2);
        assert!(zip.by_index(0).is_err());
        for i in 0..zip.len() {
            let entry = zip.by_index_decrypt(i, b"pw").unwrap();
            assert!(entry.name().ends_with(".bmp"));
        }
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.html");
        let err = list(missing.to_str().unwrap(), quiet()).await.unwrap_err();
        assert!(format!("{err:#}").contains("opening"));
    }
}
