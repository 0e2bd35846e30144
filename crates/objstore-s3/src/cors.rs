//! CORS rules and the cross-bucket CORS index.
//!
//! Preflight requests arrive before the request layer knows which account a
//! bucket belongs to, so CORS lookups go through a [`BucketCorsIndex`]: a
//! snapshot of every bucket name and every bucket's CORS rules across all
//! partitions. The snapshot is built lazily on first use and dropped whenever
//! bucket membership or CORS configuration changes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// CorsRule
// ---------------------------------------------------------------------------

/// A single CORS configuration rule for a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsRule {
    /// Optional identifier for the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Origins that are allowed; each may contain one `*` wildcard.
    pub allowed_origins: Vec<String>,
    /// HTTP methods that are allowed (e.g. `"GET"`, `"PUT"`).
    pub allowed_methods: Vec<String>,
    /// Request headers that are allowed; each may contain one `*` wildcard.
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    /// Response headers that the browser is allowed to access.
    #[serde(default)]
    pub expose_headers: Vec<String>,
    /// How long (in seconds) the browser may cache the preflight result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<i32>,
}

/// The response values of a matched CORS rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsMatch {
    /// Value for `Access-Control-Allow-Origin`.
    pub allowed_origin: String,
    /// Value list for `Access-Control-Allow-Methods`.
    pub allowed_methods: Vec<String>,
    /// Requested headers echoed in `Access-Control-Allow-Headers`.
    pub allowed_headers: Vec<String>,
    /// Value list for `Access-Control-Expose-Headers`.
    pub expose_headers: Vec<String>,
    /// Value for `Access-Control-Max-Age`.
    pub max_age_seconds: Option<i32>,
}

impl CorsRule {
    /// Evaluate this rule against a request.
    ///
    /// `origin` is compared case-sensitively, `method` and every entry of
    /// `request_headers` case-insensitively.
    #[must_use]
    pub fn evaluate(
        &self,
        origin: &str,
        method: &str,
        request_headers: &[String],
    ) -> Option<CorsMatch> {
        if !self
            .allowed_origins
            .iter()
            .any(|p| wildcard_match(p, origin, false))
        {
            return None;
        }
        if !self
            .allowed_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
        {
            return None;
        }
        if !request_headers.iter().all(|req| {
            self.allowed_headers
                .iter()
                .any(|p| wildcard_match(p, req, true))
        }) {
            return None;
        }

        let allowed_origin = if self.allowed_origins.iter().any(|o| o == "*") {
            "*".to_owned()
        } else {
            origin.to_owned()
        };
        Some(CorsMatch {
            allowed_origin,
            allowed_methods: self.allowed_methods.clone(),
            allowed_headers: request_headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
            expose_headers: self.expose_headers.clone(),
            max_age_seconds: self.max_age_seconds,
        })
    }
}

/// Match `value` against `pattern`, where `pattern` may contain one `*`
/// standing for any run of characters.
#[must_use]
pub fn wildcard_match(pattern: &str, value: &str, ignore_case: bool) -> bool {
    let eq = |a: &str, b: &str| {
        if ignore_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    };
    match pattern.split_once('*') {
        None => eq(pattern, value),
        Some((head, tail)) => {
            value.len() >= head.len() + tail.len()
                && value.is_char_boundary(head.len())
                && value.is_char_boundary(value.len() - tail.len())
                && eq(&value[..head.len()], head)
                && eq(&value[value.len() - tail.len()..], tail)
        }
    }
}

// ---------------------------------------------------------------------------
// CorsIndexSnapshot
// ---------------------------------------------------------------------------

/// Bucket names and CORS rules of every bucket at one point in time.
#[derive(Debug, Clone, Default)]
pub struct CorsIndexSnapshot {
    /// Every bucket name.
    pub buckets: HashSet<String>,
    /// CORS rules of every bucket that has a configuration.
    pub cors: HashMap<String, Vec<CorsRule>>,
}

impl CorsIndexSnapshot {
    /// Whether the bucket existed when the snapshot was built.
    #[must_use]
    pub fn contains_bucket(&self, bucket: &str) -> bool {
        self.buckets.contains(bucket)
    }

    /// Rules of `bucket`, if it has a CORS configuration.
    #[must_use]
    pub fn rules(&self, bucket: &str) -> Option<&[CorsRule]> {
        self.cors.get(bucket).map(Vec::as_slice)
    }

    /// Return the first rule of `bucket` that allows the request.
    #[must_use]
    pub fn match_cors(
        &self,
        bucket: &str,
        origin: &str,
        method: &str,
        request_headers: &[String],
    ) -> Option<CorsMatch> {
        self.rules(bucket)?
            .iter()
            .find_map(|rule| rule.evaluate(origin, method, request_headers))
    }
}

// ---------------------------------------------------------------------------
// BucketCorsIndex
// ---------------------------------------------------------------------------

/// Lazily built, explicitly invalidated [`CorsIndexSnapshot`].
///
/// # Examples
///
/// ```
/// use objstore_s3::cors::{BucketCorsIndex, CorsIndexSnapshot};
///
/// let index = BucketCorsIndex::new();
/// let snapshot = index.get_or_build(|| {
///     let mut snapshot = CorsIndexSnapshot::default();
///     snapshot.buckets.insert("photos".to_owned());
///     snapshot
/// });
/// assert!(snapshot.contains_bucket("photos"));
///
/// // Cached until invalidated.
/// let again = index.get_or_build(CorsIndexSnapshot::default);
/// assert!(again.contains_bucket("photos"));
///
/// index.invalidate();
/// assert!(!index.get_or_build(CorsIndexSnapshot::default).contains_bucket("photos"));
/// ```
#[derive(Debug, Default)]
pub struct BucketCorsIndex {
    cache: RwLock<Option<Arc<CorsIndexSnapshot>>>,
    generation: AtomicU64,
}

impl BucketCorsIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached snapshot, building it with `build` if there is none.
    ///
    /// A snapshot whose build overlapped an [`invalidate`](Self::invalidate)
    /// is returned to the caller but not cached.
    pub fn get_or_build(&self, build: impl FnOnce() -> CorsIndexSnapshot) -> Arc<CorsIndexSnapshot> {
        if let Some(snapshot) = self.cache.read().as_ref() {
            return Arc::clone(snapshot);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let snapshot = Arc::new(build());
        debug!(
            buckets = snapshot.buckets.len(),
            with_cors = snapshot.cors.len(),
            "rebuilt cors index"
        );

        let mut cache = self.cache.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *cache = Some(Arc::clone(&snapshot));
        }
        snapshot
    }

    /// Drop the cached snapshot. The next read rebuilds it.
    pub fn invalidate(&self) {
        let mut cache = self.cache.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *cache = None;
    }

    /// Whether a snapshot is currently cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.read().is_some()
    }
}
