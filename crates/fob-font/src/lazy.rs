//! Deferred loader construction.
//!
//! Loaders are only built when the first font of their kind is loaded, so a
//! project that only uses local fonts never sets up the Google Fonts client.

use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::loader::FontLoader;

type LoaderFactory = Box<dyn Fn() -> Arc<dyn FontLoader> + Send + Sync>;

/// A memoized loader factory.
///
/// The first [`get`](Self::get) runs the factory; concurrent callers await
/// the same construction and later calls return the cached loader.
pub struct LazyLoader {
    factory: LoaderFactory,
    loader: OnceCell<Arc<dyn FontLoader>>,
}

impl LazyLoader {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn FontLoader> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            loader: OnceCell::new(),
        }
    }

    /// Wrap an already constructed loader.
    pub fn ready(loader: Arc<dyn FontLoader>) -> Self {
        let factory_loader = loader.clone();
        Self {
            factory: Box::new(move || factory_loader.clone()),
            loader: OnceCell::new_with(Some(loader)),
        }
    }

    pub async fn get(&self) -> Arc<dyn FontLoader> {
        self.loader
            .get_or_init(|| async {
                tracing::debug!("constructing font loader");
                (self.factory)()
            })
            .await
            .clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.loader.initialized()
    }
}

impl fmt::Debug for LazyLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLoader")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoaderError;
    use crate::loader::{FontLoaderOutput, LoaderContext};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NamedLoader;

    #[async_trait]
    impl FontLoader for NamedLoader {
        async fn load(&self, _: &LoaderContext<'_>) -> Result<FontLoaderOutput, LoaderError> {
            Ok(FontLoaderOutput::default())
        }
    }

    #[tokio::test]
    async fn test_constructs_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let lazy = Arc::new(LazyLoader::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(NamedLoader) as Arc<dyn FontLoader>
        }));
        assert!(!lazy.is_initialized());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = lazy.clone();
                tokio::spawn(async move { lazy.get().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let first = lazy.get().await;
        let second = lazy.get().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_skips_factory() {
        let lazy = LazyLoader::ready(Arc::new(NamedLoader));
        assert!(lazy.is_initialized());
        lazy.get().await;
    }
}
