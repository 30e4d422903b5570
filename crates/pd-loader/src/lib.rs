//! Document loading for a tree of frames: navigation policy, the
//! provisional/committed loader lifecycle, history, completion and `load`
//! events, scheduled navigations, and the per-frame fetch context.

pub mod appcache;
pub mod client;
pub mod config;
pub mod console;
pub mod context;
pub mod document;
pub mod document_loader;
pub mod fetch_context;
pub mod frame_load_request;
pub mod frame_loader;
pub mod frame_tree;
pub mod history;
pub mod mhtml;
pub mod mixed_content;
pub mod page;
pub mod progress;
pub mod scheduler;
pub mod state_machine;
pub mod timing;
pub mod writer;


pub use appcache::ApplicationCacheBackend;
pub use appcache::ApplicationCacheEvent;
pub use appcache::ApplicationCacheEventId;
pub use appcache::ApplicationCacheEventTarget;
pub use appcache::ApplicationCacheHost;
pub use client::DefaultClient;
pub use client::FrameClients;
pub use client::LifecycleClient;
pub use client::NavigationClient;
pub use client::NavigationPolicy;
pub use client::NavigationType;
pub use config::LoaderSettings;
pub use console::ConsoleMessage;
pub use context::FrameTask;
pub use context::LoaderContext;
pub use document::Document;
pub use document::DocumentReadyState;
pub use document_loader::DocumentLoader;
pub use fetch_context::FrameFetchContext;
pub use frame_load_request::ClientRedirectPolicy;
pub use frame_load_request::FormSubmission;
pub use frame_load_request::FrameLoadRequest;
pub use frame_load_request::FrameLoadType;
pub use frame_load_request::SubstituteData;
pub use frame_loader::FrameLoader;
pub use frame_loader::LoaderPhase;
pub use frame_loader::SubresourceLoad;
pub use frame_tree::FrameOwner;
pub use frame_tree::FrameOwnerKind;
pub use frame_tree::FrameRef;
pub use frame_tree::FrameTree;
pub use history::BackForwardList;
pub use history::HistoryCommitType;
pub use history::HistoryItem;
pub use mhtml::MhtmlArchive;
pub use page::Page;
pub use progress::ProgressTracker;
pub use scheduler::NavigationScheduler;
pub use state_machine::FrameLoaderStateMachine;
pub use timing::DocumentLoadTiming;
