//! Per-project orchestration: owns every cache, runs the scan pipeline,
//! and arbitrates concurrent scans through a generation counter.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info};

use crate::base_url::{BaseUrlCache, BaseUrlResolver, ResolvedBaseUrl};
use crate::config::ConfigCache;
use crate::details::{DetailCache, DetailResolver, EndpointDocDetails};
use crate::endpoint::{Endpoint, EndpointKey};
use crate::project::Project;
use crate::scan::Scanner;

/// Most recently surfaced endpoint keys kept for pre-selection.
const RECENCY_LIMIT: usize = 50;
const DETAIL_CACHE_CAPACITY: usize = 512;

/// Handle for one in-flight scan. A commit is accepted only while no
/// newer scan has begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanToken {
    generation: u64,
}

/// Everything one scan produces: the merged endpoint list and the
/// project base URL with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub endpoints: Vec<Endpoint>,
    pub base_url: ResolvedBaseUrl,
}

/// Long-lived engine state for one project. Every cache lives here;
/// dropping the context drops all derived state at once.
pub struct ProjectContext {
    scanner: Scanner,
    base_url_resolver: BaseUrlResolver,
    detail_resolver: DetailResolver,
    base_url_cache: BaseUrlCache,
    config_cache: ConfigCache,
    detail_cache: DetailCache,
    /// project id -> (modification count, config mtime, merged results).
    scan_cache: HashMap<String, (u64, u64, Vec<Endpoint>)>,
    recent: VecDeque<EndpointKey>,
    generation: u64,
}

impl ProjectContext {
    pub fn new() -> Self {
        Self {
            scanner: Scanner::new(),
            base_url_resolver: BaseUrlResolver::new(),
            detail_resolver: DetailResolver::new(),
            base_url_cache: BaseUrlCache::default(),
            config_cache: ConfigCache::default(),
            detail_cache: DetailCache::with_capacity(DETAIL_CACHE_CAPACITY),
            scan_cache: HashMap::new(),
            recent: VecDeque::new(),
            generation: 0,
        }
    }

    /// Full pipeline plus base URL provenance, for hosts that render
    /// both.
    pub fn scan(&mut self, project: &dyn Project) -> ScanOutcome {
        ScanOutcome {
            endpoints: self.endpoints(project),
            base_url: self.resolve_base_url(project),
        }
    }

    /// Full pipeline with caching: discover, resolve base URLs, apply
    /// overrides. Returns the cached result unless the project or its
    /// override file changed since the last run.
    pub fn endpoints(&mut self, project: &dyn Project) -> Vec<Endpoint> {
        let version = cache_version(project);
        if let Some((cached_version, cached_mtime, endpoints)) =
            self.scan_cache.get(project.project_id())
        {
            if (*cached_version, *cached_mtime) == version {
                debug!(project = project.project_id(), "scan cache hit");
                return endpoints.clone();
            }
        }

        let token = self.begin_scan();
        let endpoints = self.compute(project);
        self.commit_scan(token, project, endpoints.clone());
        endpoints
    }

    /// Start a scan and supersede any scan still in flight.
    pub fn begin_scan(&mut self) -> ScanToken {
        self.generation += 1;
        ScanToken {
            generation: self.generation,
        }
    }

    /// Run the pipeline without touching the result cache. Hosts that
    /// scan on a background thread pair this with [`Self::begin_scan`]
    /// and [`Self::commit_scan`].
    pub fn compute(&mut self, project: &dyn Project) -> Vec<Endpoint> {
        let base = self
            .base_url_cache
            .resolve(project, &self.base_url_resolver);
        let mut endpoints = self.scanner.scan(project, base.url.as_deref());

        if let Some(file) = project.config_file() {
            endpoints = self.config_cache.get_or_parse(&file).apply(endpoints);
        }

        info!(
            project = project.project_id(),
            count = endpoints.len(),
            "scan complete"
        );
        endpoints
    }

    /// Store a finished scan's results. Returns `None` when a newer scan
    /// began after this one, in which case the results are discarded.
    pub fn commit_scan(
        &mut self,
        token: ScanToken,
        project: &dyn Project,
        endpoints: Vec<Endpoint>,
    ) -> Option<Vec<Endpoint>> {
        if token.generation != self.generation {
            debug!(
                project = project.project_id(),
                "discarding superseded scan results"
            );
            return None;
        }
        let (version, config_mtime) = cache_version(project);
        self.scan_cache.insert(
            project.project_id().to_string(),
            (version, config_mtime, endpoints.clone()),
        );
        Some(endpoints)
    }

    /// The project's resolved base URL with provenance, cached.
    pub fn resolve_base_url(&mut self, project: &dyn Project) -> ResolvedBaseUrl {
        self.base_url_cache.resolve(project, &self.base_url_resolver)
    }

    /// On-demand detail enrichment for one endpoint, cached per index
    /// version.
    pub fn resolve_details(
        &mut self,
        project: &dyn Project,
        endpoint: &Endpoint,
    ) -> EndpointDocDetails {
        let version = project.modification_count();
        let key = endpoint.key();
        if let Some(details) = self.detail_cache.get(version, &key) {
            return details.clone();
        }
        let details = self.detail_resolver.resolve(project, endpoint);
        self.detail_cache.put(version, key, details.clone());
        details
    }

    /// Record that the user acted on an endpoint; most recent first,
    /// deduplicated, bounded.
    pub fn mark_used(&mut self, key: EndpointKey) {
        self.recent.retain(|k| *k != key);
        self.recent.push_front(key);
        self.recent.truncate(RECENCY_LIMIT);
    }

    pub fn recent_keys(&self) -> impl Iterator<Item = &EndpointKey> {
        self.recent.iter()
    }
}

impl Default for ProjectContext {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_version(project: &dyn Project) -> (u64, u64) {
    (
        project.modification_count(),
        project.config_file().map(|c| c.mtime).unwrap_or(0),
    )
}
