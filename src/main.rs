use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mangalens::cli::{Cli, Command, parse_comment};
use mangalens::config::AppConfig;
use mangalens::gemini::GeminiClient;
use mangalens::orchestrator::{BatchOutcome, DispatchConfig, JobDispatcher};
use mangalens::source::{MangaDexClient, SourceProxy, file_name_for, import_chapter};
use mangalens::state_machine::{ItemId, ItemSource, ItemState, WorkItem};
use mangalens::store::{ItemStore, SharedStore, ViewMode, lock};
use mangalens::translator::{RetryPolicy, TranslationClient, decode_data_uri};
use mangalens::ui::BatchProgress;
use mangalens::validate::CandidateFile;

type Dispatcher = JobDispatcher<GeminiClient, SourceProxy>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    init_tracing(cli.verbose, &config.log_level);

    if let Some(n) = cli.concurrency {
        config.max_concurrent = n.max(1);
    }
    if let Some(out) = &cli.out {
        config.output_dir = out.display().to_string();
    }
    let out_dir = PathBuf::from(&config.output_dir);
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let retry_failed = cli.retry_failed;
    debug!(max_concurrent = config.max_concurrent, out = %out_dir.display(), "Effective settings");

    let store = ItemStore::new().into_shared();
    {
        let mut guard = lock(&store);
        guard.set_view_mode(cli.view.into());
        if let Some(series) = &cli.series {
            guard.set_series_name(series.as_str());
        }
    }

    match cli.command {
        Command::Translate { files } => {
            let dispatcher = build_dispatcher(&config, timeout)?;
            let mut candidates = Vec::with_capacity(files.len());
            for path in &files {
                let file = CandidateFile::from_path(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                candidates.push(file);
            }

            let ids = lock(&store).add_files(candidates);
            report_global_error(&store);
            run_and_save(&dispatcher, &store, &ids, &out_dir, timeout, retry_failed).await?;
        }

        Command::Chapter { reference, limit } => {
            let dispatcher = build_dispatcher(&config, timeout)?;
            let lookup = MangaDexClient::with_base_url(config.mangadex_api_url.clone(), timeout)?;

            let ids = match import_chapter(&lookup, &store, &reference, limit).await {
                Ok(ids) => ids,
                Err(err) => {
                    report_global_error(&store);
                    return Err(err.into());
                }
            };
            println!("Imported {} pages", ids.len());
            run_and_save(&dispatcher, &store, &ids, &out_dir, timeout, retry_failed).await?;
        }

        Command::Feedback { file, comments } => {
            let comments = comments
                .iter()
                .map(|raw| parse_comment(raw))
                .collect::<Result<Vec<_>, _>>()
                .map_err(anyhow::Error::msg)?;
            let dispatcher = build_dispatcher(&config, timeout)?;
            let candidate = CandidateFile::from_path(&file)
                .with_context(|| format!("reading {}", file.display()))?;

            let ids = lock(&store).add_files([candidate]);
            report_global_error(&store);
            let Some(id) = ids.first().cloned() else {
                bail!("{} was rejected", file.display());
            };

            let progress = BatchProgress::new();
            if let BatchOutcome::Completed(report) =
                dispatcher.run_batch_with(&store, &ids, &progress).await
            {
                progress.finish(&report);
            }

            {
                let mut guard = lock(&store);
                guard.set_feedback_mode(true);
                for comment in &comments {
                    if let Some(added) = guard.add_comment(&id, comment.x, comment.y) {
                        guard.update_comment(&id, &added.id, &comment.text);
                    }
                }
            }

            match dispatcher.regenerate(&store, &id).await {
                Ok(item) => progress.item_line(&item),
                Err(err) => {
                    report_global_error(&store);
                    return Err(err.into());
                }
            }
            let proxy = SourceProxy::new(timeout)?;
            save_outputs(&store, &out_dir, Some(&proxy)).await?;
        }

        Command::Fetch { url } => {
            let proxy = SourceProxy::new(timeout)?;
            let image = proxy.proxy_binary(&url).await?;
            std::fs::create_dir_all(&out_dir)?;
            let path = out_dir.join(file_name_for(&url));
            std::fs::write(&path, &image.bytes)?;
            println!(
                "Saved {} ({}, {} bytes)",
                path.display(),
                image.mime_type,
                image.bytes.len()
            );
        }

        Command::Models => {
            let client = GeminiClient::from_config(&config)?;
            for model in client.list_models().await? {
                match model.display_name {
                    Some(display) => println!("{}  {display}", model.name),
                    None => println!("{}", model.name),
                }
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `--verbose` or the configured level.
fn init_tracing(verbose: bool, config_level: &str) {
    let fallback = if verbose { "debug" } else { config_level };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_dispatcher(config: &AppConfig, timeout: Duration) -> Result<Dispatcher> {
    let gemini = GeminiClient::from_config(config)?;
    let proxy = SourceProxy::new(timeout)?;
    info!(model = gemini.model(), "Translation client ready");
    let client = TranslationClient::with_policy(gemini, proxy, RetryPolicy::from_config(config));
    Ok(JobDispatcher::new(client, DispatchConfig::from_config(config)))
}

fn report_global_error(store: &SharedStore) {
    if let Some(message) = lock(store).global_error() {
        BatchProgress::new().notice(message);
    }
}

async fn run_and_save(
    dispatcher: &Dispatcher,
    store: &SharedStore,
    ids: &[ItemId],
    out_dir: &Path,
    timeout: Duration,
    retry_failed: bool,
) -> Result<()> {
    let progress = BatchProgress::new();
    match dispatcher.run_batch_with(store, ids, &progress).await {
        BatchOutcome::NothingToDo => report_global_error(store),
        BatchOutcome::Completed(report) => progress.finish(&report),
    }
    if retry_failed {
        retry_failed_items(dispatcher, store, &progress).await;
    }
    let proxy = SourceProxy::new(timeout)?;
    save_outputs(store, out_dir, Some(&proxy)).await
}

/// One manual retry for every page the batch left Failed.
async fn retry_failed_items(dispatcher: &Dispatcher, store: &SharedStore, progress: &BatchProgress) {
    let failed = lock(store).ids_in(ItemState::Failed);
    if failed.is_empty() {
        return;
    }
    info!(count = failed.len(), "Retrying failed pages");
    for id in &failed {
        match dispatcher.retry_item(store, id).await {
            Ok(item) => progress.item_line(&item),
            Err(err) => warn!(item = %id, "Retry refused: {err}"),
        }
    }
}

/// Write every translated page as `translated-{name}`. In original or
/// compare view the source page is written too, as `original-{name}`.
async fn save_outputs(
    store: &SharedStore,
    out_dir: &Path,
    proxy: Option<&SourceProxy>,
) -> Result<()> {
    let (items, view): (Vec<WorkItem>, ViewMode) = {
        let guard = lock(store);
        (guard.items().to_vec(), guard.view_mode())
    };
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut written = 0;
    for item in &items {
        if let Some(location) = &item.result_location {
            match decode_data_uri(location) {
                Some((_, bytes)) => {
                    std::fs::write(out_dir.join(item.download_name()), bytes)?;
                    written += 1;
                }
                None => warn!(item = %item.id, "Result is not a data URI, skipped"),
            }
        }

        if view == ViewMode::Translated {
            continue;
        }
        let original = match (&item.source, proxy) {
            (ItemSource::Local { bytes, .. }, _) => Some(bytes.to_vec()),
            (ItemSource::Remote { url }, Some(proxy)) => match proxy.proxy_binary(url).await {
                Ok(image) => Some(image.bytes),
                Err(err) => {
                    warn!(item = %item.id, "Could not fetch original: {err}");
                    None
                }
            },
            (ItemSource::Remote { .. }, None) => None,
        };
        if let Some(bytes) = original {
            std::fs::write(out_dir.join(format!("original-{}", item.display_name)), bytes)?;
        }
    }

    info!(written, dir = %out_dir.display(), "Saved translated pages");
    Ok(())
}
