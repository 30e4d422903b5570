//! Networking contracts for the loader: URLs, HTTP values, resource
//! requests/responses, and the generic fetcher.

pub mod client_hints;
pub mod error;
pub mod fetch;
pub mod http;
pub mod mime_registry;
pub mod request;
pub mod response;
pub mod url;

pub use client_hints::ClientHintsPreferences;
pub use error::ResourceError;
pub use error::ResourceErrorKind;
pub use fetch::FetchContext;
pub use fetch::FetchRequest;
pub use fetch::MemoryCachePolicy;
pub use fetch::NetworkBackend;
pub use fetch::OriginRestriction;
pub use fetch::ResourceFetcher;
pub use fetch::ResourceLoaderOptions;
pub use fetch::ResourceType;
pub use http::Header;
pub use http::HeaderMap;
pub use http::HttpMethod;
pub use http::HttpStatusCode;
pub use request::CachePolicy;
pub use request::FrameType;
pub use request::RequestContext;
pub use request::ResourceRequest;
pub use response::ResourceResponse;
pub use url::Scheme;
