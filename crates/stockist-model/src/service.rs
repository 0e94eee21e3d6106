//! Model capability traits.
//!
//! Two capabilities are abstracted: turning text into a fixed-dimension
//! vector, and generating text from a prompt under a structured-output
//! format hint. `OllamaClient` implements both against a remote backend;
//! the mocks in this crate implement them deterministically for tests.

use stockist_core::error::Result;

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional vectors that capture
/// semantic meaning. Used for both the offline backfill (indexing) and the
/// live query path (search).
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// Because `EmbeddingService::embed` returns `impl Future` it is not
/// object-safe. This trait uses a boxed future instead, allowing
/// `Box<dyn DynEmbeddingService>` to be stored in structs without generics.
///
/// A blanket implementation is provided so that every `EmbeddingService`
/// automatically implements `DynEmbeddingService`.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>>> + Send + 'a>>;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

/// Service for text generation under a structured-output contract.
///
/// `format` is a JSON schema hint forwarded to the backend; the returned
/// string is the raw model response, decoded and validated by the caller.
pub trait TextModel: Send + Sync {
    /// Generate a completion for the given prompt.
    fn generate(
        &self,
        prompt: &str,
        format: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Object-safe version of [`TextModel`] for dynamic dispatch.
pub trait DynTextModel: Send + Sync {
    /// Generate a completion for the given prompt (boxed future).
    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
        format: &'a serde_json::Value,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>>;
}

impl<T: TextModel> DynTextModel for T {
    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a str,
        format: &'a serde_json::Value,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.generate(prompt, format))
    }
}
