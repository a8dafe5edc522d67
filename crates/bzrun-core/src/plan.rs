//! Worker planning and URL generation.
//!
//! [`RunPlan::build`] is a pure transformation from an [`EffectiveConfig`]
//! to the ordered sequence of workers a run launches: helper workers first,
//! in ascending key order, then the master last. The ordering is a hard
//! contract: the remote service must see the capacity-providing helpers
//! come online before the master that dispatches work to them.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::EffectiveConfig;

/// Characters escaped in URL query values.
///
/// A raw `&`, `=`, or `#` in a token or filter would truncate the query
/// string, so reserved characters are always encoded.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'?');

/// Characters escaped in URL fragment path segments.
const FRAGMENT_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?');

/// Role a worker plays within a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    /// Executes the named test and dispatches work to the helpers.
    Master,

    /// Provides parallel execution capacity; idles until dispatched to.
    Helper,
}

impl WorkerRole {
    /// Role name as a display string.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::Master => "master",
            WorkerRole::Helper => "helper",
        }
    }
}

/// One planned worker launch.
///
/// Created once per planning pass, never mutated, consumed exactly once by
/// the launcher. The `key` doubles as the URL parameter and the external
/// process name, so it uniquely identifies the worker within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerSpec {
    /// 1-based position, stringified. The master is always "1".
    pub key: String,

    /// Master or helper.
    pub role: WorkerRole,

    /// 1-based position among all workers; equals the numeric key.
    pub number: u32,

    /// Fully materialized URL the worker process is pointed at.
    pub url: String,
}

/// The ordered launch plan for one run: helpers ascending, master last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunPlan {
    workers: Vec<WorkerSpec>,
}

impl RunPlan {
    /// Compute the plan for a normalized configuration.
    ///
    /// Produces exactly `workers` specs: helpers for positions
    /// `2..=workers` in ascending order, then the master with key "1".
    /// A worker count of 1 yields a master-only plan.
    pub fn build(config: &EffectiveConfig) -> RunPlan {
        let total = config.workers;
        let mut workers = Vec::with_capacity(total as usize);

        for number in 2..=total {
            let key = number.to_string();
            workers.push(WorkerSpec {
                url: worker_url(config, number, &key, WorkerRole::Helper),
                key,
                role: WorkerRole::Helper,
                number,
            });
        }

        workers.push(WorkerSpec {
            key: "1".to_string(),
            role: WorkerRole::Master,
            number: 1,
            url: worker_url(config, 1, "1", WorkerRole::Master),
        });

        RunPlan { workers }
    }

    /// Workers in launch order.
    pub fn iter(&self) -> std::slice::Iter<'_, WorkerSpec> {
        self.workers.iter()
    }

    /// Total number of planned workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the plan is empty. Never true for a built plan.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// The master spec (always the last entry).
    pub fn master(&self) -> &WorkerSpec {
        self.workers
            .last()
            .expect("a built plan always contains the master")
    }

    /// Deterministic identity of the plan.
    ///
    /// SHA-256 over the ordered worker keys and URLs; two plans built from
    /// identical configurations share a digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for spec in &self.workers {
            hasher.update(spec.key.as_bytes());
            hasher.update(b"\0");
            hasher.update(spec.url.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

/// Materialize the URL for one worker.
///
/// Helpers get the shared query template and a `#{project}/{branch}`
/// fragment ("start and idle"). The master additionally gets the `filter`
/// parameter and a `#{project}/{branch}/{test}/run` fragment ("execute the
/// named test now").
fn worker_url(config: &EffectiveConfig, number: u32, key: &str, role: WorkerRole) -> String {
    let q = |value: &str| utf8_percent_encode(value, QUERY_VALUE).to_string();
    let f = |value: &str| utf8_percent_encode(value, FRAGMENT_SEGMENT).to_string();

    let mut url = format!(
        "{}/extension?parameter={}&token={}&project={}&number={}&total={}&group={}",
        config.base_url,
        q(&config.parameter),
        q(&config.token),
        q(&config.project),
        number,
        config.workers,
        q(&config.group),
    );

    if role == WorkerRole::Master {
        url.push_str(&format!("&filter={}", q(&config.filter)));
    }

    url.push_str(&format!(
        "&scope={}&env={}&key={}&self={}",
        q(&config.scope),
        q(&config.env),
        q(key),
        q(&config.self_mode),
    ));

    match role {
        WorkerRole::Master => url.push_str(&format!(
            "#{}/{}/{}/run",
            f(&config.project),
            f(&config.branch),
            f(&config.test),
        )),
        WorkerRole::Helper => {
            url.push_str(&format!("#{}/{}", f(&config.project), f(&config.branch)))
        }
    }

    url
}
