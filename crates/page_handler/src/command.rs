//! Commands the scheduler accepts on its bounded channel, processed
//! serially on the scheduler's single logical task.

use crate::network_profile::LinkSignals;
use crate::page_state::NavigationKind;
use crate::transport::{TransferTotals, TransportErrorKind};
use html::ResourceKind;

/// A discovery hint accompanying a `Discover` command, carrying the subset
/// of `html::DiscoveryHint` the prioritizer needs plus viewport membership
/// supplied by the layout solver.
#[derive(Debug, Clone, Default)]
pub struct DiscoverHint {
    pub render_blocking: bool,
    pub in_head: bool,
    pub parser_inserted: bool,
    pub async_or_defer: bool,
    pub in_viewport: bool,
    pub lazy: bool,
    /// URL of the resource that discovered this one (e.g. the document that
    /// referenced it), used to record a catalog dependent edge.
    pub parent_url: Option<String>,
}

/// Outcome of a preconnect attempt reported back from the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconnectOutcome {
    Warm,
    Failed,
}

/// One operation the scheduler processes. Cross-producer ordering is not
/// guaranteed; per-producer order is preserved by the channel.
#[derive(Debug, Clone)]
pub enum Command {
    StartNavigation {
        url: String,
        kind: NavigationKind,
    },
    Discover {
        url: String,
        kind: ResourceKind,
        hint: DiscoverHint,
    },
    RecordByte {
        url: String,
        delta: u64,
    },
    CompleteFetch {
        url: String,
        totals: TransferTotals,
    },
    FailFetch {
        url: String,
        message: String,
        kind: TransportErrorKind,
    },
    Hover {
        url: String,
    },
    Click {
        url: String,
    },
    UpdateNetwork {
        signals: LinkSignals,
        save_data: bool,
        battery_level: f64,
        charging: bool,
    },
    PreconnectResult {
        origin: String,
        outcome: PreconnectOutcome,
    },
    TickPolicies,
    Stop,
}
