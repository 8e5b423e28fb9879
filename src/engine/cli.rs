//! CLI command handler: export one batch, then optionally vacuum.

use anyhow::Result;
use log::{debug, info};

use crate::Opts;
use crate::engine::arg_parser::Cli;
use crate::engine::db_ops::{SqliteDocumentStore, SqliteRankingStore};
use crate::engine::progress::{create_counter, finish_bar, progress_callback};
use crate::engine::tools::install_cancellation;
use crate::pipeline::{ExportParams, export, is_benign, vacuum_stale_ranking_data};
use crate::utils::rankgraph_toml::{apply_file_to_opts, load_rankgraph_toml};
use crate::utils::{get_passphrase, setup_logging};

/// Overwrite opts field from CLI when given.
macro_rules! apply_cli_opt {
    ($cli:expr, $opts:expr, $cli_field:ident => $($opts_field:ident).+) => {
        if let Some(ref v) = $cli.$cli_field {
            $opts.$($opts_field).+ = v.clone();
        }
    };
}

/// Defaults → `.rankgraph.toml` in DIR → CLI flags.
pub fn setup_opts(cli: &Cli) -> Opts {
    let mut opts = Opts {
        store_path: cli.store_path(),
        documents_path: cli.documents_path(),
        ..Default::default()
    };
    if let Some(file) = load_rankgraph_toml(&cli.dir) {
        apply_file_to_opts(&file, &cli.dir, &mut opts);
    }
    if let Some(ref p) = cli.store {
        opts.store_path = p.clone();
    }
    if let Some(ref p) = cli.documents {
        opts.documents_path = p.clone();
    }
    apply_cli_opt!(cli, opts, enabled => export.enabled);
    apply_cli_opt!(cli, opts, queue_capacity => export.queue_capacity);
    apply_cli_opt!(cli, opts, skip_prefix => export.skip_prefix);
    apply_cli_opt!(cli, opts, graph_key => graph_key);
    apply_cli_opt!(cli, opts, read_batch_size => read_batch_size);
    apply_cli_opt!(cli, opts, write_batch_size => write_batch_size);
    apply_cli_opt!(cli, opts, encrypt => encrypt);
    apply_cli_opt!(cli, opts, timeout => timeout_secs);
    apply_cli_opt!(cli, opts, verbose => verbose);
    apply_cli_opt!(cli, opts, vacuum => vacuum);
    opts
}

/// Run one export batch (and vacuum when asked). Cancellation is reported, not treated as a failure.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);
    setup_logging(opts.verbose);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );

    if !opts.export.enabled {
        info!("Ranking export is disabled; nothing to do");
        return Ok(());
    }

    let passphrase = if opts.encrypt {
        Some(get_passphrase(&cli.dir, !opts.store_path.exists())?)
    } else {
        None
    };
    let store = SqliteRankingStore::open(&opts.store_path, passphrase.as_deref())?;
    let documents = SqliteDocumentStore::open(&opts.documents_path, passphrase.as_deref())?;
    let cancel = install_cancellation(opts.timeout_secs)?;

    let bar = opts.verbose.then(|| create_counter("Exporting"));
    let params = ExportParams {
        graph_key: &opts.graph_key,
        read_batch_size: opts.read_batch_size,
        write_batch_size: opts.write_batch_size,
        opts: &opts.export,
        cancel: &cancel,
        on_upload_done: progress_callback(&bar),
    };

    let result = export(&store, &documents, &params);
    if let Some(ref pb) = bar {
        finish_bar(pb);
    }
    let summary = match result {
        Ok(summary) => summary,
        Err(e) if is_benign(&e) => {
            info!("Export cancelled; batch rolled back");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    info!(
        "Exported {} uploads ({} definitions, {} references) under graph key {:?}",
        summary.uploads_processed,
        summary.definitions_inserted,
        summary.references_inserted,
        opts.graph_key
    );

    if opts.vacuum {
        let vacuumed = vacuum_stale_ranking_data(&store, &opts.graph_key)?;
        info!(
            "Vacuumed {} definitions, {} references, {} initial path ranks",
            vacuumed.definitions_deleted, vacuumed.references_deleted, vacuumed.initial_paths_deleted
        );
    }
    Ok(())
}
