//! # Block Scanner Service
//!
//! Single-writer scanning engine for one chain. Owns the scan position,
//! runs the main and retry loops and hands blocks to a bounded queue.

use bifrost_telemetry::{names, Metrics};
use parking_lot::Mutex;
use shared_types::Chain;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::{
    BlockFetcher, BlockScanStatus, BlockScannerConfig, ConsensusHeightSource, FetchError,
    ScannerError, ScannerStorage,
};

/// State shared by the two loops.
struct ScanContext<F: BlockFetcher> {
    chain: Chain,
    config: BlockScannerConfig,
    fetcher: Arc<F>,
    storage: Arc<dyn ScannerStorage>,
    metrics: Arc<Metrics>,
    position: Arc<AtomicI64>,
    // serialises hand-off release against consumer failure reports
    status_lock: Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Generic block scanner, parameterised by its fetcher.
pub struct BlockScanner<F: BlockFetcher> {
    ctx: Arc<ScanContext<F>>,
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<F: BlockFetcher> BlockScanner<F> {
    /// Create a scanner. Nothing runs until [`BlockScanner::start`].
    pub fn new(
        config: BlockScannerConfig,
        fetcher: Arc<F>,
        storage: Arc<dyn ScannerStorage>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ScannerError> {
        config.validate()?;
        let chain = fetcher.chain();
        if let Err(e) = metrics.register_chain(chain.as_str()) {
            warn!(chain = %chain, error = %e, "[bf-01] Failed to register chain metrics");
        }
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            ctx: Arc::new(ScanContext {
                chain,
                config,
                fetcher,
                storage,
                metrics,
                position: Arc::new(AtomicI64::new(0)),
                status_lock: Mutex::new(()),
                shutdown_tx,
            }),
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Chain being scanned.
    pub fn chain(&self) -> &Chain {
        &self.ctx.chain
    }

    /// Live scan position (last height handed downstream).
    pub fn position(&self) -> Arc<AtomicI64> {
        Arc::clone(&self.ctx.position)
    }

    /// Decide where scanning starts.
    ///
    /// Order: stored position, configured start height, consensus hint
    /// (last observed height, or the consensus height when scanning the
    /// consensus chain itself), adapter tip.
    pub async fn init_position(
        &self,
        consensus: Option<&dyn ConsensusHeightSource>,
    ) -> Result<i64, ScannerError> {
        let ctx = &self.ctx;
        let pos = self.discover_position(consensus).await?;
        ctx.position.store(pos, Ordering::SeqCst);
        info!(chain = %ctx.chain, position = pos, "[bf-01] Scan position initialised");
        Ok(pos)
    }

    async fn discover_position(
        &self,
        consensus: Option<&dyn ConsensusHeightSource>,
    ) -> Result<i64, ScannerError> {
        let ctx = &self.ctx;

        let stored = ctx.storage.get_scan_pos()?;
        if stored > 0 {
            return Ok(stored);
        }
        if ctx.config.start_block_height > 0 {
            return Ok(ctx.config.start_block_height);
        }

        if let Some(source) = consensus {
            source
                .wait_to_catch_up()
                .await
                .map_err(ScannerError::HeightDiscovery)?;
            let hint = if ctx.chain.is_thor() {
                source.block_height().await
            } else {
                source.last_observed_in_height(&ctx.chain).await
            }
            .map_err(ScannerError::HeightDiscovery)?;
            if hint > 0 {
                return Ok(hint);
            }
        }

        let tip = ctx.fetcher.get_height().await?;
        debug!(chain = %ctx.chain, tip, "[bf-01] Starting from adapter tip");
        Ok(tip.max(0))
    }

    /// Spawn the main and retry loops. A second call is a no-op.
    pub fn start(&self, out: mpsc::Sender<F::Block>) -> Result<(), ScannerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let main = tokio::spawn(run_main_loop(
            Arc::clone(&self.ctx),
            out.clone(),
            self.ctx.shutdown_tx.subscribe(),
        ));
        let retry = tokio::spawn(run_retry_loop(
            Arc::clone(&self.ctx),
            out,
            self.ctx.shutdown_tx.subscribe(),
        ));
        self.handles.lock().extend([main, retry]);

        info!(
            chain = %self.ctx.chain,
            position = self.ctx.position.load(Ordering::SeqCst),
            "[bf-01] Block scanner started"
        );
        Ok(())
    }

    /// Signal both loops and wait for them. Safe to call twice.
    pub async fn stop(&self) {
        self.ctx.shutdown_tx.send_replace(true);
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(chain = %self.ctx.chain, error = %e, "[bf-01] Scanner task panicked");
            }
        }
        debug!(chain = %self.ctx.chain, "[bf-01] Block scanner stopped");
    }

    /// Consumer report that the block at `height` could not be processed.
    /// The height is tracked as failed and the retry loop replays it.
    pub fn mark_failed(&self, height: i64) {
        let ctx = &self.ctx;
        let _guard = ctx.status_lock.lock();
        warn!(chain = %ctx.chain, height, "[bf-01] Block rejected downstream, scheduling retry");
        ctx.record_status(height, BlockScanStatus::Failed);
    }

    /// Whether the loops have exited on their own (fatal store failure).
    pub fn is_halted(&self) -> bool {
        *self.ctx.shutdown_tx.borrow()
    }
}

/// Sleep for `period`; returns true when shutdown was signalled.
async fn sleep_or_shutdown(period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(period) => *shutdown.borrow(),
        _ = shutdown.changed() => true,
    }
}

/// Fetch racing the shutdown signal. `None` means shutdown.
async fn fetch_or_shutdown<F: BlockFetcher>(
    fetcher: &F,
    height: i64,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Result<F::Block, FetchError>> {
    tokio::select! {
        res = fetcher.fetch_block(height) => Some(res),
        _ = shutdown.changed() => None,
    }
}

/// Send racing the shutdown signal. False means stop.
async fn send_or_shutdown<T>(
    out: &mpsc::Sender<T>,
    block: T,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        res = out.send(block) => res.is_ok(),
        _ = shutdown.changed() => false,
    }
}

impl<F: BlockFetcher> ScanContext<F> {
    fn record_status(&self, height: i64, status: BlockScanStatus) {
        if let Err(e) = self.storage.set_block_status(height, status) {
            error!(chain = %self.chain, height, error = %e, "[bf-01] Failed to set block status");
            self.metrics
                .inc_error(names::BLOCK_SCANNER_ERROR, "fail_set_block_status", self.chain.as_str());
        }
    }

    fn mark_processing(&self, height: i64) {
        let _guard = self.status_lock.lock();
        self.record_status(height, BlockScanStatus::Processing);
    }

    /// Stop tracking a handed-off height unless the consumer already
    /// reported it failed.
    fn release(&self, height: i64) {
        let _guard = self.status_lock.lock();
        match self.storage.get_block_status(height) {
            Ok(Some(BlockScanStatus::Failed)) => {
                debug!(chain = %self.chain, height, "[bf-01] Height failed downstream, keeping it");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!(chain = %self.chain, height, error = %e, "[bf-01] Failed to read block status");
                return;
            }
        }
        self.clear_status(height);
    }

    fn clear_status(&self, height: i64) {
        if let Err(e) = self.storage.clear_block_status(height) {
            error!(chain = %self.chain, height, error = %e, "[bf-01] Failed to clear block status");
            self.metrics.inc_error(
                names::BLOCK_SCANNER_ERROR,
                "fail_remove_block_status",
                self.chain.as_str(),
            );
        }
    }
}

async fn run_main_loop<F: BlockFetcher>(
    ctx: Arc<ScanContext<F>>,
    out: mpsc::Sender<F::Block>,
    mut shutdown: watch::Receiver<bool>,
) {
    let back_off = ctx.config.block_height_discover_back_off;

    loop {
        if *shutdown.borrow() {
            break;
        }
        let height = ctx.position.load(Ordering::SeqCst) + 1;

        let block = match fetch_or_shutdown(ctx.fetcher.as_ref(), height, &mut shutdown).await {
            None => break,
            Some(Ok(block)) => block,
            Some(Err(FetchError::HeightNotYetProduced(_))) => {
                trace!(chain = %ctx.chain, height, "[bf-01] Height not yet produced");
                if sleep_or_shutdown(back_off, &mut shutdown).await {
                    break;
                }
                continue;
            }
            Some(Err(e)) => {
                warn!(chain = %ctx.chain, height, error = %e, "[bf-01] Failed to fetch block");
                ctx.record_status(height, BlockScanStatus::Failed);
                ctx.metrics
                    .inc_error(names::BLOCK_SCAN_ERROR, "fail_get_block", ctx.chain.as_str());
                if sleep_or_shutdown(back_off, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        ctx.mark_processing(height);

        if let Err(e) = ctx.storage.set_scan_pos(height) {
            error!(
                chain = %ctx.chain,
                height,
                error = %e,
                "[bf-01] Failed to persist scan position, stopping scanner"
            );
            ctx.metrics.inc_error(
                names::BLOCK_SCANNER_ERROR,
                "fail_save_block_pos",
                ctx.chain.as_str(),
            );
            ctx.shutdown_tx.send_replace(true);
            break;
        }
        ctx.position.store(height, Ordering::SeqCst);
        ctx.metrics.counter(names::TOTAL_BLOCK_SCANNED).inc();
        ctx.metrics.counter(names::CURRENT_POSITION).inc();

        if F::is_empty(&block) {
            ctx.metrics
                .chain_counter(ctx.chain.as_str(), names::BLOCK_WITHOUT_TX)
                .inc();
        } else if !send_or_shutdown(&out, block, &mut shutdown).await {
            // status stays `processing`; the next full pass replays it
            break;
        }

        ctx.release(height);
    }

    debug!(chain = %ctx.chain, "[bf-01] Main loop exited");
}

async fn run_retry_loop<F: BlockFetcher>(
    ctx: Arc<ScanContext<F>>,
    out: mpsc::Sender<F::Block>,
    mut shutdown: watch::Receiver<bool>,
) {
    // the first pass also replays heights left `processing` by a crash,
    // bounded by the position at start so in-flight heights are not doubled
    let start_pos = ctx.position.load(Ordering::SeqCst);
    let mut failed_only = false;

    loop {
        if sleep_or_shutdown(ctx.config.block_retry_interval, &mut shutdown).await {
            break;
        }

        let tracked = match ctx.storage.list_blocks_for_retry(failed_only) {
            Ok(tracked) => tracked,
            Err(e) => {
                error!(chain = %ctx.chain, error = %e, "[bf-01] Failed to list blocks for retry");
                ctx.metrics.inc_error(
                    names::BLOCK_SCANNER_ERROR,
                    "fail_list_blocks_for_retry",
                    ctx.chain.as_str(),
                );
                continue;
            }
        };
        let boundary = if failed_only {
            ctx.position.load(Ordering::SeqCst)
        } else {
            start_pos
        };
        failed_only = true;

        for item in tracked {
            if item.height > boundary {
                continue;
            }

            let block =
                match fetch_or_shutdown(ctx.fetcher.as_ref(), item.height, &mut shutdown).await {
                    None => return,
                    Some(Ok(block)) => block,
                    Some(Err(e)) => {
                        debug!(
                            chain = %ctx.chain,
                            height = item.height,
                            error = %e,
                            "[bf-01] Retry fetch failed"
                        );
                        ctx.record_status(item.height, BlockScanStatus::Failed);
                        continue;
                    }
                };

            ctx.mark_processing(item.height);
            if !F::is_empty(&block) && !send_or_shutdown(&out, block, &mut shutdown).await {
                return;
            }
            ctx.release(item.height);
            ctx.metrics.counter(names::TOTAL_RETRY_BLOCKS).inc();
            debug!(chain = %ctx.chain, height = item.height, "[bf-01] Replayed block");
        }
    }

    debug!(chain = %ctx.chain, "[bf-01] Retry loop exited");
}
