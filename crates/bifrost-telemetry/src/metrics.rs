//! Prometheus metrics for Bifrost components.
//!
//! All metrics are registered under the `bifrost` namespace. Components look
//! handles up by their short name (see [`names`]); an unknown name yields a
//! handle that is not registered anywhere, so updates to it are dropped.
//!
//! ## Metric Types
//!
//! - **Counter**: monotonically increasing value (e.g. `total_block_scanned`)
//! - **CounterVec**: error counters labelled `(error_name, additional)`
//! - **Histogram**: durations in seconds (e.g. `send_to_thorchain_duration`)

use parking_lot::RwLock;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

use crate::TelemetryError;

const NAMESPACE: &str = "bifrost";
const ERROR_LABELS: &[&str] = &["error_name", "additional"];

/// Short metric names.
pub mod names {
    /// Blocks fetched by any scanner
    pub const TOTAL_BLOCK_SCANNED: &str = "total_block_scanned";
    /// Scan position advances
    pub const CURRENT_POSITION: &str = "current_position";
    /// Heights replayed by retry loops
    pub const TOTAL_RETRY_BLOCKS: &str = "total_retry_blocks";
    /// Witness transactions accepted by consensus
    pub const TX_TO_THORCHAIN: &str = "tx_to_thorchain";
    /// Witness transactions signed
    pub const TX_TO_THORCHAIN_SIGNED: &str = "tx_to_thorchain_signed";

    /// Scanner storage and loop errors
    pub const BLOCK_SCANNER_ERROR: &str = "block_scanner_error";
    /// Observation pipeline errors
    pub const OBSERVER_ERROR: &str = "observer_error";
    /// Signing pipeline errors
    pub const SIGNER_ERROR: &str = "signer_error";
    /// Public-key registry errors
    pub const PUBKEY_MANAGER_ERROR: &str = "pubkey_manager_error";
    /// Consensus client errors
    pub const THORCHAIN_BRIDGE_ERROR: &str = "thorchain_bridge_error";
    /// Block fetch errors
    pub const BLOCK_SCAN_ERROR: &str = "block_scan_error";

    /// Time to sign a consensus transaction
    pub const SIGN_TO_THORCHAIN_DURATION: &str = "sign_to_thorchain_duration";
    /// Time to sign and post a consensus transaction
    pub const SEND_TO_THORCHAIN_DURATION: &str = "send_to_thorchain_duration";

    /// Per chain: block without any tx
    pub const BLOCK_WITHOUT_TX: &str = "block_without_tx";
    /// Per chain: block with vault-relevant txs
    pub const BLOCK_WITH_TX_IN: &str = "block_with_tx_in";
    /// Per chain: block with txs, none relevant
    pub const BLOCK_NO_TX_IN: &str = "block_no_tx_in";
    /// Per chain: outbound txs signed
    pub const TX_SIGNED: &str = "tx_signed";
    /// Per chain: outbound txs broadcast
    pub const TX_SIGNED_BROADCAST: &str = "tx_signed_broadcast";
    /// Per chain: time to parse a block
    pub const SEARCH_TX_DURATION: &str = "search_tx_duration";
    /// Per chain: time to sign and broadcast one instruction
    pub const SIGN_AND_BROADCAST_DURATION: &str = "sign_and_broadcast_duration";

    /// Name of a per-chain metric, e.g. `bnb_tx_signed`.
    pub fn chain_metric(chain: &str, suffix: &str) -> String {
        format!("{}_{}", chain.to_ascii_lowercase(), suffix)
    }
}

const COUNTERS: &[(&str, &str)] = &[
    (names::TOTAL_BLOCK_SCANNED, "Total number of blocks scanned"),
    (names::CURRENT_POSITION, "Scan position advances"),
    (names::TOTAL_RETRY_BLOCKS, "Total blocks retried"),
    (names::TX_TO_THORCHAIN, "Witness txs posted to thorchain successfully"),
    (names::TX_TO_THORCHAIN_SIGNED, "Witness txs signed successfully"),
];

const COUNTER_VECS: &[(&str, &str)] = &[
    (names::BLOCK_SCANNER_ERROR, "Errors in the block scanner"),
    (names::OBSERVER_ERROR, "Errors in the observer"),
    (names::SIGNER_ERROR, "Errors in the signer"),
    (names::PUBKEY_MANAGER_ERROR, "Errors in the pubkey manager"),
    (names::THORCHAIN_BRIDGE_ERROR, "Errors in the thorchain bridge"),
    (names::BLOCK_SCAN_ERROR, "Errors fetching blocks"),
];

const HISTOGRAMS: &[(&str, &str)] = &[
    (names::SIGN_TO_THORCHAIN_DURATION, "Time to sign a tx to thorchain"),
    (names::SEND_TO_THORCHAIN_DURATION, "Time to sign and post a tx to thorchain"),
];

const CHAIN_COUNTERS: &[(&str, &str)] = &[
    (names::BLOCK_WITHOUT_TX, "Blocks without any tx"),
    (names::BLOCK_WITH_TX_IN, "Blocks with txs to process"),
    (names::BLOCK_NO_TX_IN, "Blocks with txs, none for our vaults"),
    (names::TX_SIGNED, "Outbound txs signed"),
    (names::TX_SIGNED_BROADCAST, "Outbound txs broadcast"),
];

const CHAIN_HISTOGRAMS: &[(&str, &str)] = &[
    (names::SEARCH_TX_DURATION, "Time to search txs in a block"),
    (names::SIGN_AND_BROADCAST_DURATION, "Time to sign and broadcast an outbound tx"),
];

fn duration_opts(name: &str, help: &str) -> Result<HistogramOpts, TelemetryError> {
    Ok(HistogramOpts::new(name, help)
        .namespace(NAMESPACE)
        .buckets(exponential_buckets(0.001, 2.0, 16)?))
}

/// Process-wide metrics registry, owned by the runtime.
pub struct Metrics {
    registry: Registry,
    counters: RwLock<HashMap<String, Counter>>,
    counter_vecs: HashMap<&'static str, CounterVec>,
    histograms: RwLock<HashMap<String, Histogram>>,
    noop_counter: Counter,
    noop_counter_vec: CounterVec,
    noop_histogram: Histogram,
}

impl Metrics {
    /// Create a registry with every fixed metric registered.
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let mut counters = HashMap::new();
        for (name, help) in COUNTERS {
            let counter = Counter::with_opts(Opts::new(*name, *help).namespace(NAMESPACE))?;
            registry.register(Box::new(counter.clone()))?;
            counters.insert((*name).to_string(), counter);
        }

        let mut counter_vecs = HashMap::new();
        for (name, help) in COUNTER_VECS {
            let vec = CounterVec::new(Opts::new(*name, *help).namespace(NAMESPACE), ERROR_LABELS)?;
            registry.register(Box::new(vec.clone()))?;
            counter_vecs.insert(*name, vec);
        }

        let mut histograms = HashMap::new();
        for (name, help) in HISTOGRAMS {
            let histogram = Histogram::with_opts(duration_opts(name, help)?)?;
            registry.register(Box::new(histogram.clone()))?;
            histograms.insert((*name).to_string(), histogram);
        }

        Ok(Self {
            registry,
            counters: RwLock::new(counters),
            counter_vecs,
            histograms: RwLock::new(histograms),
            noop_counter: Counter::new("noop", "unregistered")?,
            noop_counter_vec: CounterVec::new(Opts::new("noop", "unregistered"), ERROR_LABELS)?,
            noop_histogram: Histogram::with_opts(HistogramOpts::new("noop", "unregistered"))?,
        })
    }

    /// Register the per-chain metrics of `chain`. Idempotent.
    pub fn register_chain(&self, chain: &str) -> Result<(), TelemetryError> {
        {
            let mut counters = self.counters.write();
            for (suffix, help) in CHAIN_COUNTERS {
                let name = names::chain_metric(chain, suffix);
                if counters.contains_key(&name) {
                    continue;
                }
                let counter = Counter::with_opts(Opts::new(name.clone(), *help).namespace(NAMESPACE))?;
                self.registry.register(Box::new(counter.clone()))?;
                counters.insert(name, counter);
            }
        }

        let mut histograms = self.histograms.write();
        for (suffix, help) in CHAIN_HISTOGRAMS {
            let name = names::chain_metric(chain, suffix);
            if histograms.contains_key(&name) {
                continue;
            }
            let histogram = Histogram::with_opts(duration_opts(&name, help)?)?;
            self.registry.register(Box::new(histogram.clone()))?;
            histograms.insert(name, histogram);
        }

        debug!(chain, "Registered chain metrics");
        Ok(())
    }

    /// Counter by short name; unknown names give a no-op handle.
    pub fn counter(&self, name: &str) -> Counter {
        self.counters
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.noop_counter.clone())
    }

    /// Per-chain counter, e.g. `chain_counter("BNB", names::TX_SIGNED)`.
    pub fn chain_counter(&self, chain: &str, suffix: &str) -> Counter {
        self.counter(&names::chain_metric(chain, suffix))
    }

    /// Error counter vector by short name; unknown names give a no-op handle.
    pub fn counter_vec(&self, name: &str) -> CounterVec {
        self.counter_vecs
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.noop_counter_vec.clone())
    }

    /// Increment `vec{error_name, additional}`.
    pub fn inc_error(&self, vec: &str, error_name: &str, additional: &str) {
        self.counter_vec(vec)
            .with_label_values(&[error_name, additional])
            .inc();
    }

    /// Histogram by short name; unknown names give a no-op handle.
    pub fn histogram(&self, name: &str) -> Histogram {
        self.histograms
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.noop_histogram.clone())
    }

    /// Per-chain histogram.
    pub fn chain_histogram(&self, chain: &str, suffix: &str) -> Histogram {
        self.histogram(&names::chain_metric(chain, suffix))
    }

    /// Start a timer that observes into `name` when dropped.
    pub fn start_timer(&self, name: &str) -> HistogramTimer {
        HistogramTimer::new(&self.histogram(name))
    }

    /// Underlying registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
