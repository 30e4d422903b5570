//! Blocks or warns about insecure fetches from secure frames.
//!
//! The checker only reads published frame snapshots, and it drops the frame
//! tree borrow before consulting the embedder.

use crate::client::FrameClients;
use crate::console::ConsoleMessage;
use crate::console::MessageLevel;
use crate::console::MessageSource;
use crate::context::LoaderContext;
use log::warn;
use pd_core::FrameId;
use pd_net::FrameType;
use pd_net::RequestContext;
use pd_security::MixedContentContextType;
use pd_security::SecurityOrigin;
use pd_security::is_mixed_content;
use url::Url;

struct MixedFrame {
    id: FrameId,
    url: Url,
    origin: SecurityOrigin,
    block_all_mixed_content: bool,
}

pub struct MixedContentChecker<'a> {
    context: &'a LoaderContext,
    clients: &'a FrameClients,
}

impl<'a> MixedContentChecker<'a> {
    pub fn new(context: &'a LoaderContext, clients: &'a FrameClients) -> Self {
        Self { context, clients }
    }

    /// Decides whether a fetch of `url` issued on behalf of `frame` must be
    /// blocked. Nested frame loads are judged against the parent.
    pub fn should_block_fetch(
        &self,
        frame: FrameId,
        request_context: RequestContext,
        frame_type: FrameType,
        url: &Url,
    ) -> bool {
        if frame_type == FrameType::TopLevel {
            return false;
        }

        let Some(mixed_frame) = self.in_which_frame_is_content_mixed(frame, frame_type, url) else {
            return false;
        };

        let settings = &self.context.settings().security;
        let strict_mode =
            mixed_frame.block_all_mixed_content || settings.strict_mixed_content_checking;
        let mut context_type = context_type_from_request_context(request_context, strict_mode);
        if frame_type == FrameType::Nested
            && !self
                .context
                .scheme_registry()
                .should_treat_url_scheme_as_cors_enabled(url.scheme())
        {
            context_type = MixedContentContextType::OptionallyBlockable;
        }

        let security = &self.clients.security;
        let allowed = match context_type {
            MixedContentContextType::OptionallyBlockable => {
                let allowed = !strict_mode
                    && security.allow_display_insecure_content(
                        mixed_frame.id,
                        settings.allow_display_of_insecure_content,
                        &mixed_frame.origin,
                        url,
                    );
                if allowed {
                    security.did_display_insecure_content(mixed_frame.id, &mixed_frame.origin, url);
                }
                allowed
            }
            MixedContentContextType::Blockable => {
                let should_ask_embedder = !strict_mode
                    && (!settings.strictly_block_blockable_mixed_content
                        || settings.allow_running_of_insecure_content);
                let allowed = should_ask_embedder
                    && security.allow_running_insecure_content(
                        mixed_frame.id,
                        settings.allow_running_of_insecure_content,
                        &mixed_frame.origin,
                        url,
                    );
                if allowed {
                    security.did_run_insecure_content(mixed_frame.id, &mixed_frame.origin, url);
                }
                allowed
            }
            MixedContentContextType::ShouldBeBlockable => {
                let allowed = !strict_mode;
                if allowed {
                    security.did_display_insecure_content(mixed_frame.id, &mixed_frame.origin, url);
                }
                allowed
            }
            MixedContentContextType::NotMixedContent => true,
        };

        self.log_to_console(frame, &mixed_frame.url, url, request_context, allowed);
        !allowed
    }

    /// The top frame is checked first, then the frame the request acts for.
    fn in_which_frame_is_content_mixed(
        &self,
        frame: FrameId,
        frame_type: FrameType,
        url: &Url,
    ) -> Option<MixedFrame> {
        let tree = self.context.frame_tree();
        let registry = self.context.scheme_registry();
        let effective = if frame_type == FrameType::Nested {
            tree.parent(frame).unwrap_or(frame)
        } else {
            frame
        };

        [tree.top(effective), effective].into_iter().find_map(|candidate| {
            let snapshot = tree.snapshot(candidate)?;
            is_mixed_content(&snapshot.security_origin, url, registry).then(|| MixedFrame {
                id: candidate,
                url: snapshot.url.clone(),
                origin: snapshot.security_origin.clone(),
                block_all_mixed_content: snapshot.block_all_mixed_content,
            })
        })
    }

    fn log_to_console(
        &self,
        frame: FrameId,
        page_url: &Url,
        url: &Url,
        request_context: RequestContext,
        allowed: bool,
    ) {
        let (level, suffix) = if allowed {
            (
                MessageLevel::Warning,
                "This content should also be served over HTTPS.",
            )
        } else {
            (
                MessageLevel::Error,
                "This request has been blocked; the content must be served over HTTPS.",
            )
        };
        let text = format!(
            "Mixed Content: The page at '{page_url}' was loaded over HTTPS, but requested an insecure {} '{url}'. {suffix}",
            request_context_name(request_context)
        );
        if !allowed {
            warn!("blocked mixed content {url} in frame {frame}");
        }
        let message = ConsoleMessage::new(MessageSource::Security, level, text);
        message.log();
        self.clients.lifecycle.did_add_console_message(frame, &message);
    }
}

fn context_type_from_request_context(
    request_context: RequestContext,
    strict_mode: bool,
) -> MixedContentContextType {
    match request_context {
        RequestContext::Audio
        | RequestContext::Favicon
        | RequestContext::Image
        | RequestContext::Video => MixedContentContextType::OptionallyBlockable,
        RequestContext::Plugin => {
            if strict_mode {
                MixedContentContextType::Blockable
            } else {
                MixedContentContextType::ShouldBeBlockable
            }
        }
        RequestContext::Download | RequestContext::Internal | RequestContext::Prefetch => {
            MixedContentContextType::ShouldBeBlockable
        }
        _ => MixedContentContextType::Blockable,
    }
}

fn request_context_name(request_context: RequestContext) -> &'static str {
    match request_context {
        RequestContext::Audio => "audio file",
        RequestContext::Beacon => "Beacon endpoint",
        RequestContext::CspReport => "Content Security Policy reporting endpoint",
        RequestContext::Download => "download",
        RequestContext::Embed | RequestContext::Object => "plugin resource",
        RequestContext::EventSource => "EventSource endpoint",
        RequestContext::Favicon => "favicon",
        RequestContext::Fetch | RequestContext::XmlHttpRequest => "XMLHttpRequest endpoint",
        RequestContext::Font => "font",
        RequestContext::Form => "form action",
        RequestContext::Frame | RequestContext::Iframe => "frame",
        RequestContext::Hyperlink | RequestContext::Location => "resource",
        RequestContext::Image | RequestContext::ImageSet => "image",
        RequestContext::Import => "HTML Import",
        RequestContext::Manifest => "manifest",
        RequestContext::Ping => "ping resource",
        RequestContext::Plugin => "plugin data",
        RequestContext::Prefetch => "prefetch resource",
        RequestContext::Script => "script",
        RequestContext::ServiceWorker => "Service Worker script",
        RequestContext::SharedWorker => "Shared Worker script",
        RequestContext::Style => "stylesheet",
        RequestContext::Track => "Text Track",
        RequestContext::Video => "video",
        RequestContext::Worker => "Worker script",
        RequestContext::Xslt => "XSLT",
        RequestContext::Unspecified
        | RequestContext::Internal
        | RequestContext::Subresource => "resource",
    }
}

#[cfg(test)]
mod tests {
    use super::MixedContentChecker;
    use crate::client::ApplicationCacheClient;
    use crate::client::FrameClients;
    use crate::client::LifecycleClient;
    use crate::client::NavigationClient;
    use crate::client::PermissionClient;
    use crate::client::SecurityClient;
    use crate::config::LoaderSettings;
    use crate::console::ConsoleMessage;
    use crate::console::MessageLevel;
    use crate::context::LoaderContext;
    use crate::frame_tree::FrameOwner;
    use crate::frame_tree::FrameOwnerKind;
    use crate::frame_tree::FrameSnapshot;
    use pd_core::BrowserResult;
    use pd_core::FrameId;
    use pd_core::ManualClock;
    use pd_core::ResourceId;
    use pd_net::FrameType;
    use pd_net::NetworkBackend;
    use pd_net::RequestContext;
    use pd_net::ResourceRequest;
    use pd_security::SchemeRegistry;
    use pd_security::SecurityOrigin;
    use std::cell::RefCell;
    use std::rc::Rc;
    use url::Url;

    struct NullBackend;

    impl NetworkBackend for NullBackend {
        fn start(&self, _identifier: ResourceId, _request: &ResourceRequest) -> BrowserResult<()> {
            Ok(())
        }

        fn cancel(&self, _identifier: ResourceId) {}
    }

    #[derive(Default)]
    struct Recorder {
        displayed: RefCell<Vec<Url>>,
        ran: RefCell<Vec<Url>>,
        console: RefCell<Vec<ConsoleMessage>>,
    }

    impl NavigationClient for Recorder {}
    impl PermissionClient for Recorder {}
    impl ApplicationCacheClient for Recorder {}

    impl LifecycleClient for Recorder {
        fn did_add_console_message(&self, _frame: FrameId, message: &ConsoleMessage) {
            self.console.borrow_mut().push(message.clone());
        }
    }

    impl SecurityClient for Recorder {
        fn did_display_insecure_content(&self, _frame: FrameId, _origin: &SecurityOrigin, url: &Url) {
            self.displayed.borrow_mut().push(url.clone());
        }

        fn did_run_insecure_content(&self, _frame: FrameId, _origin: &SecurityOrigin, url: &Url) {
            self.ran.borrow_mut().push(url.clone());
        }
    }

    fn url(input: &str) -> Url {
        match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn setup(top_url: &str) -> (Rc<LoaderContext>, FrameClients, Rc<Recorder>) {
        let context = match LoaderContext::new(
            LoaderSettings::default(),
            Rc::new(NullBackend),
            Rc::new(ManualClock::new()),
        ) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let registry = SchemeRegistry::default();
        {
            let mut tree = context.frame_tree_mut();
            assert!(tree.insert_main_frame(FrameId::new(1)).is_ok());
            assert!(
                tree.insert_child_frame(
                    FrameId::new(1),
                    FrameId::new(2),
                    "child",
                    FrameOwner::new(FrameOwnerKind::Iframe),
                )
                .is_ok()
            );
            let top = url(top_url);
            let origin = SecurityOrigin::create(&top, &registry);
            tree.set_snapshot(FrameId::new(1), FrameSnapshot::new(top.clone(), origin.clone()));
            tree.set_snapshot(FrameId::new(2), FrameSnapshot::new(top, origin));
        }
        let recorder = Rc::new(Recorder::default());
        let clients = FrameClients::uniform(recorder.clone());
        (context, clients, recorder)
    }

    #[test]
    fn insecure_pages_never_mix() {
        let (context, clients, recorder) = setup("http://a.example/");
        let checker = MixedContentChecker::new(&context, &clients);
        let blocked = checker.should_block_fetch(
            FrameId::new(1),
            RequestContext::Script,
            FrameType::None,
            &url("http://cdn.example/app.js"),
        );
        assert!(!blocked);
        assert!(recorder.console.borrow().is_empty());
    }

    #[test]
    fn passive_content_is_displayed_with_a_warning() {
        let (context, clients, recorder) = setup("https://a.example/");
        let checker = MixedContentChecker::new(&context, &clients);
        let image = url("http://cdn.example/logo.png");
        assert!(!checker.should_block_fetch(FrameId::new(2), RequestContext::Image, FrameType::None, &image));
        assert_eq!(recorder.displayed.borrow().as_slice(), &[image]);
        let console = recorder.console.borrow();
        assert_eq!(console.len(), 1);
        assert_eq!(console[0].level, MessageLevel::Warning);
        assert!(console[0].text.contains("requested an insecure image"));
    }

    #[test]
    fn active_content_is_blocked() {
        let (context, clients, recorder) = setup("https://a.example/");
        let checker = MixedContentChecker::new(&context, &clients);
        let script = url("http://cdn.example/app.js");
        assert!(checker.should_block_fetch(FrameId::new(1), RequestContext::Script, FrameType::None, &script));
        assert!(recorder.ran.borrow().is_empty());
        let console = recorder.console.borrow();
        assert_eq!(console[0].level, MessageLevel::Error);
        assert!(console[0].text.ends_with("the content must be served over HTTPS."));
    }

    #[test]
    fn strict_mode_blocks_passive_content() {
        let (context, clients, _recorder) = setup("https://a.example/");
        context
            .frame_tree_mut()
            .update_snapshot(FrameId::new(1), |snapshot| snapshot.block_all_mixed_content = true);
        let checker = MixedContentChecker::new(&context, &clients);
        assert!(checker.should_block_fetch(
            FrameId::new(2),
            RequestContext::Image,
            FrameType::None,
            &url("http://cdn.example/logo.png"),
        ));
    }

    #[test]
    fn top_level_navigations_are_exempt() {
        let (context, clients, _recorder) = setup("https://a.example/");
        let checker = MixedContentChecker::new(&context, &clients);
        assert!(!checker.should_block_fetch(
            FrameId::new(1),
            RequestContext::Hyperlink,
            FrameType::TopLevel,
            &url("http://b.example/"),
        ));
    }
}
