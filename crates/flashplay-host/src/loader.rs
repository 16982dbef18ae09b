//! Plugin loader: resolves a card's renderer and mounts it.
//!
//! Mounting means pointing the host surface's isolated frame at the plugin
//! page for a card. The loader does not wait for the plugin to come up: a
//! plugin is an untrusted page with no readiness signal, so the session
//! relies on its completion timer instead.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::HostError;
use crate::gateway::{CardGateway, PluginName};
use crate::message::HostOrigin;
use crate::playlist::CardId;
use crate::surface::HostSurface;

/// Path prefix under which plugin pages are served.
pub const DEFAULT_PLUGIN_ROUTE: &str = "/api/plugin";

/// Query parameter plugins read their card id from.
pub const CARD_ID_PARAM: &str = "cardId";

/// Identity of one mount. Every load of a card, including reloading the same
/// card, gets a fresh generation; traffic tagged with an older one is stale.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A plugin page the surface has been told to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountTarget {
    pub generation: Generation,
    pub card_id: CardId,
    pub plugin: PluginName,
    pub url: Url,
    /// Card content as returned by the gateway; plugins usually fetch it
    /// themselves, surfaces may preload it.
    pub payload: serde_json::Value,
}

/// Resolves plugins through the gateway and mounts them on the surface.
pub struct PluginLoader {
    gateway: Arc<dyn CardGateway>,
    surface: Arc<dyn HostSurface>,
    host_origin: HostOrigin,
    plugin_route: String,
    mounted: Option<MountTarget>,
}

impl fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLoader")
            .field("host_origin", &self.host_origin)
            .field("plugin_route", &self.plugin_route)
            .field("mounted", &self.mounted)
            .finish_non_exhaustive()
    }
}

impl PluginLoader {
    pub fn new(
        gateway: Arc<dyn CardGateway>,
        surface: Arc<dyn HostSurface>,
        host_origin: HostOrigin,
        plugin_route: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            surface,
            host_origin,
            plugin_route: plugin_route.into(),
            mounted: None,
        }
    }

    /// Address of the plugin page for a card:
    /// `{origin}{route}/{plugin}?cardId={card}`.
    ///
    /// `.` and `..` are rejected: as path segments they would resolve to the
    /// route itself or its parent rather than to a plugin page.
    pub fn target_url(&self, plugin: &PluginName, card_id: &CardId) -> Result<Url, HostError> {
        if matches!(plugin.as_str(), "." | "..") {
            return Err(HostError::PluginResolutionFailed {
                card_id: card_id.clone(),
                reason: format!("invalid plugin name '{plugin}'"),
            });
        }
        let mut url = self.host_origin.base_url().join(&self.plugin_route)?;
        // The host origin is a tuple origin, so its URLs always have a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(plugin.as_str());
        }
        url.query_pairs_mut()
            .clear()
            .append_pair(CARD_ID_PARAM, card_id.as_str());
        url.set_fragment(None);
        Ok(url)
    }

    /// Resolve the card's plugin and point the surface at it, replacing the
    /// previous mount. Any resolution problem is `PluginResolutionFailed`.
    pub async fn mount(
        &mut self,
        card_id: &CardId,
        generation: Generation,
    ) -> Result<MountTarget, HostError> {
        let record = self
            .gateway
            .get_card(card_id)
            .await
            .map_err(|e| HostError::PluginResolutionFailed {
                card_id: card_id.clone(),
                reason: e.to_string(),
            })?;

        if record.plugin.is_empty() {
            return Err(HostError::PluginResolutionFailed {
                card_id: card_id.clone(),
                reason: "card has no plugin".to_string(),
            });
        }

        let target = MountTarget {
            generation,
            card_id: card_id.clone(),
            url: self.target_url(&record.plugin, card_id)?,
            plugin: record.plugin,
            payload: record.payload,
        };

        self.surface.navigate(&target)?;
        tracing::debug!(
            card_id = %card_id,
            plugin = %target.plugin,
            generation = %generation,
            url = %target.url,
            "plugin mounted"
        );

        self.mounted = Some(target.clone());
        Ok(target)
    }

    /// The plugin currently shown by the surface, if any.
    pub fn mounted(&self) -> Option<&MountTarget> {
        self.mounted.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{ChannelSurface, SurfaceCommand};
    use crate::testing::MemoryGateway;

    fn loader_with(
        gateway: MemoryGateway,
    ) -> (
        PluginLoader,
        tokio::sync::mpsc::UnboundedReceiver<SurfaceCommand>,
    ) {
        let (surface, rx) = ChannelSurface::new();
        let loader = PluginLoader::new(
            Arc::new(gateway),
            Arc::new(surface),
            HostOrigin::parse("http://localhost:8080").unwrap(),
            DEFAULT_PLUGIN_ROUTE,
        );
        (loader, rx)
    }

    #[test]
    fn test_generation_next() {
        let g = Generation::default();
        assert_eq!(g.value(), 0);
        assert_eq!(g.next().next(), Generation::new(2));
        assert!(g < g.next());
    }

    #[test]
    fn test_target_url() {
        let (loader, _rx) = loader_with(MemoryGateway::new());
        let url = loader
            .target_url(&PluginName::new("dummy"), &CardId::from(12))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/plugin/dummy?cardId=12");
    }

    #[test]
    fn test_target_url_encodes_inputs() {
        let (loader, _rx) = loader_with(MemoryGateway::new());
        let url = loader
            .target_url(&PluginName::new("flip word"), &CardId::from("a&b"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/plugin/flip%20word?cardId=a%26b"
        );
    }

    #[test]
    fn test_target_url_trailing_slash_route() {
        let (surface, _rx) = ChannelSurface::new();
        let loader = PluginLoader::new(
            Arc::new(MemoryGateway::new()),
            Arc::new(surface),
            HostOrigin::parse("https://cards.example").unwrap(),
            "/plugins/",
        );
        let url = loader
            .target_url(&PluginName::new("drawing-canvas"), &CardId::from("c1"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cards.example/plugins/drawing-canvas?cardId=c1"
        );
    }

    #[tokio::test]
    async fn test_mount_navigates_surface() {
        let gateway = MemoryGateway::new().with_card("c1", "dummy");
        let (mut loader, mut rx) = loader_with(gateway);

        let target = loader
            .mount(&CardId::from("c1"), Generation::new(3))
            .await
            .unwrap();
        assert_eq!(target.plugin.as_str(), "dummy");
        assert_eq!(target.generation, Generation::new(3));
        assert_eq!(loader.mounted(), Some(&target));

        match rx.try_recv().unwrap() {
            SurfaceCommand::Navigate(nav) => {
                assert_eq!(nav.card_id, CardId::from("c1"));
                assert_eq!(nav.generation, Generation::new(3));
                assert_eq!(nav.url.as_str(), "http://localhost:8080/api/plugin/dummy?cardId=c1");
            }
            other => panic!("expected navigate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mount_replaces_previous() {
        let gateway = MemoryGateway::new()
            .with_card("c1", "dummy")
            .with_card("c2", "da-vinci-facts");
        let (mut loader, _rx) = loader_with(gateway);

        loader.mount(&CardId::from("c1"), Generation::new(1)).await.unwrap();
        loader.mount(&CardId::from("c2"), Generation::new(2)).await.unwrap();

        let mounted = loader.mounted().unwrap();
        assert_eq!(mounted.card_id, CardId::from("c2"));
        assert_eq!(mounted.generation, Generation::new(2));
    }

    #[tokio::test]
    async fn test_mount_unknown_card_fails_resolution() {
        let (mut loader, mut rx) = loader_with(MemoryGateway::new());

        let err = loader
            .mount(&CardId::from("ghost"), Generation::new(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HostError::PluginResolutionFailed { ref card_id, .. } if card_id.as_str() == "ghost"
        ));
        assert!(loader.mounted().is_none());
        assert!(rx.try_recv().is_err(), "nothing should be mounted");
    }

    #[tokio::test]
    async fn test_mount_empty_plugin_name_fails_resolution() {
        let gateway = MemoryGateway::new().with_card("c1", "");
        let (mut loader, _rx) = loader_with(gateway);

        let err = loader
            .mount(&CardId::from("c1"), Generation::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::PluginResolutionFailed { .. }));
    }

    #[test]
    fn test_target_url_rejects_dot_segments() {
        let (loader, _rx) = loader_with(MemoryGateway::new());
        for name in [".", ".."] {
            let err = loader
                .target_url(&PluginName::new(name), &CardId::from("c1"))
                .unwrap_err();
            match err {
                HostError::PluginResolutionFailed { card_id, .. } => {
                    assert_eq!(card_id, CardId::from("c1"));
                }
                other => panic!("{name}: expected resolution failure, got {other:?}"),
            }
        }
        // Dots inside a name are ordinary characters
        let url = loader
            .target_url(&PluginName::new("v1.2"), &CardId::from("c1"))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/plugin/v1.2?cardId=c1");
    }

    #[tokio::test]
    async fn test_mount_dot_plugin_name_fails_resolution() {
        let gateway = MemoryGateway::new().with_card("c1", "..");
        let (mut loader, mut rx) = loader_with(gateway);

        let err = loader
            .mount(&CardId::from("c1"), Generation::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::PluginResolutionFailed { .. }));
        assert!(loader.mounted().is_none());
        assert!(rx.try_recv().is_err(), "route root must not be mounted");
    }
}
