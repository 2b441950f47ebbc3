//! Messages carrying asynchronous completions back into a project.

use proxyforge_core::{Asset, AssetRequest, AssetResult};
use proxyforge_media::JobReport;

#[derive(Debug)]
pub(crate) enum ProjectMessage {
    /// Outcome of a request issued by the registry.
    AssetLoaded {
        request: AssetRequest,
        result: AssetResult<Asset>,
    },
    /// Outcome of resolving a proxy output, tagged with the probe token.
    ProxyProbed {
        token: u64,
        result: AssetResult<Asset>,
    },
    JobFinished(JobReport),
}
