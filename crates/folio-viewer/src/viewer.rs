//! The viewer façade.
//!
//! A [`Viewer`] owns the spine's documents and drives pagination:
//!
//! 1. **Load** - [`Viewer::load_document`] / [`Viewer::load_spine`] fetch
//!    and style every spine item, then queue layout.
//! 2. **Run** - the host calls [`Viewer::run_slice`] from its event loop.
//!    Each slice runs queued tasks (one page, or one image fetch, per task)
//!    until the time slice is used up.
//! 3. **Navigate** - [`Viewer::navigate`] moves to a page, an EPage, a CFI
//!    or a link target. Targets past the laid-out pages are laid out on the
//!    spot.
//!
//! Resizing advances the generation token: queued tasks and fetches in
//! flight for the old size are dropped, the pages are laid out again with
//! the same style context, and the reader is returned to the position they
//! were viewing.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use folio_common::{MessageQueue, percent_decode, resolve_url, split_fragment};
use folio_css::{ApproximateFontMetrics, FlowMap, FlowPosition, FontMetrics, PageContent, PageLayout, PageSide};
use serde::Serialize;
use strum_macros::Display;

use crate::cfi::{Cfi, CfiError};
use crate::config::ViewerOptions;
use crate::document::Document;
use crate::epage::{epage_of, offset_of_epage};
use crate::epub::{ArchiveFetcher, EpubArchive, Package};
use crate::error::ViewerError;
use crate::events::{EventBus, Listener, ViewerEvent};
use crate::resources::{Fetcher, NetFetcher, measure_image};
use crate::scheduler::{DEFAULT_SLICE, GenerationToken, Scheduler, TaskOutcome};

/// Where to navigate.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Global 0-based page index.
    Page(usize),
    /// The page (or spread) after the current one.
    Next,
    /// The page (or spread) before the current one.
    Previous,
    /// The first page.
    First,
    /// The last page.
    Last,
    /// An EPage, fractional values allowed.
    EPage(f64),
    /// An `epubcfi(...)` string.
    Cfi(String),
    /// A link, relative to the current document.
    Url(String),
}

/// How [`Viewer::query_zoom_factor`] fits pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomType {
    /// The whole page (or spread) inside the viewport.
    FitInsideViewport,
}

/// Direction pages are turned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PageProgression {
    /// Left to right: the first page is a right page.
    Ltr,
    /// Right to left: the first page is a left page.
    Rtl,
}

/// Two facing pages, as global page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Spread {
    /// Page shown on the left.
    pub left: Option<usize>,
    /// Page shown on the right.
    pub right: Option<usize>,
}

impl Spread {
    fn pages(self) -> impl Iterator<Item = usize> {
        self.left.into_iter().chain(self.right)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Task {
    /// Lay out the next page of a spine item.
    Layout { spine: usize },
    /// Load an image of a spine item.
    Fetch { spine: usize, src: String, url: String },
}

/// The position being viewed.
#[derive(Debug, Clone)]
struct Location {
    spine: usize,
    /// Page within the spine item.
    page: usize,
    position: FlowPosition,
}

/// A handle the host (or a fetcher) keeps to talk to the viewer while it
/// is busy.
#[derive(Debug, Clone)]
pub struct ViewerHandle {
    token: GenerationToken,
    pending_resize: Rc<Cell<Option<(f32, f32)>>>,
}

impl ViewerHandle {
    /// Ask for a new viewport size. Work for the old size is invalidated at
    /// once; the relayout starts with the next slice.
    pub fn request_resize(&self, width: f32, height: f32) {
        self.pending_resize.set(Some((width, height)));
        let generation = self.token.advance();
        tracing::debug!(width, height, generation, "resize requested");
    }
}

/// Paginated view of a spine of documents.
pub struct Viewer {
    options: ViewerOptions,
    fetcher: Rc<dyn Fetcher>,
    /// Where spine items load from: `fetcher`, or an open book in front of it.
    resources: Rc<dyn Fetcher>,
    metrics: Box<dyn FontMetrics>,
    messages: MessageQueue,
    documents: Vec<Document>,
    scheduler: Scheduler<Task>,
    events: EventBus,
    pending_resize: Rc<Cell<Option<(f32, f32)>>>,
    location: Option<Location>,
    /// A `nav` event is due once the location's page is laid out.
    nav_pending: bool,
    resizing: bool,
}

impl Viewer {
    /// A viewer loading from the network and the file system.
    #[must_use]
    pub fn new(options: ViewerOptions) -> Self {
        Self::with_fetcher(options, Box::new(NetFetcher))
    }

    /// A viewer loading resources through `fetcher`.
    #[must_use]
    pub fn with_fetcher(options: ViewerOptions, fetcher: Box<dyn Fetcher>) -> Self {
        let fetcher: Rc<dyn Fetcher> = Rc::from(fetcher);
        Self {
            options,
            resources: Rc::clone(&fetcher),
            fetcher,
            metrics: Box::new(ApproximateFontMetrics),
            messages: MessageQueue::new(),
            documents: Vec::new(),
            scheduler: Scheduler::new(GenerationToken::new(), DEFAULT_SLICE),
            events: EventBus::new(),
            pending_resize: Rc::default(),
            location: None,
            nav_pending: false,
            resizing: false,
        }
    }

    /// Measure text with `metrics` instead of the built-in approximation.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Box<dyn FontMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Current options.
    #[must_use]
    pub const fn options(&self) -> &ViewerOptions {
        &self.options
    }

    /// A handle for requests made while the viewer is busy.
    #[must_use]
    pub fn handle(&self) -> ViewerHandle {
        ViewerHandle {
            token: self.scheduler.token().clone(),
            pending_resize: Rc::clone(&self.pending_resize),
        }
    }

    /// Register a callback for every event.
    pub fn add_listener(&mut self, listener: Listener) {
        self.events.subscribe(listener);
    }

    /// Loaded spine items.
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Spine item `spine`.
    #[must_use]
    pub fn document(&self, spine: usize) -> Option<&Document> {
        self.documents.get(spine)
    }

    /// Stale tasks and results dropped so far.
    #[must_use]
    pub const fn discarded_tasks(&self) -> usize {
        self.scheduler.discarded()
    }

    /// Load a single document. A `#fragment` on `url` (an id or `f=<cfi>`)
    /// is navigated to once loaded.
    ///
    /// # Errors
    ///
    /// Returns a [`ViewerError`] when the document cannot be fetched or
    /// parsed. A fragment that names nothing, or holds a malformed CFI, is
    /// reported as a warning and the first page is shown.
    pub fn load_document(&mut self, url: &str) -> Result<(), ViewerError> {
        let (base, fragment) = split_fragment(url);
        self.load_spine(&[base])?;
        if let Some(fragment) = fragment {
            let _ = self.navigate_to_internal_url(&format!("#{fragment}"))?;
        }
        Ok(())
    }

    /// Load the documents of a spine in reading order. Previously loaded
    /// documents and all queued work are dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`ViewerError`] for the first document that cannot be
    /// fetched or parsed; nothing is loaded then.
    pub fn load_spine(&mut self, urls: &[&str]) -> Result<(), ViewerError> {
        self.resources = Rc::clone(&self.fetcher);
        self.load_items(urls)
    }

    /// Open the EPUB at `url` and load its spine. Spine items, stylesheets
    /// and images are then read from the archive.
    ///
    /// # Errors
    ///
    /// Returns a [`ViewerError`] when the book cannot be fetched, is not an
    /// EPUB, or one of its spine items cannot be parsed.
    pub fn load_epub(&mut self, url: &str) -> Result<Package, ViewerError> {
        let bytes = self.fetcher.fetch(url)?;
        let opened = EpubArchive::from_bytes(&bytes).and_then(|archive| {
            let package = archive.package(&self.messages)?;
            Ok((archive, package))
        });
        let (archive, package) = opened.map_err(|source| ViewerError::Epub {
            url: url.to_string(),
            source,
        })?;
        tracing::info!(url, title = ?package.title, items = package.spine.len(), "opened EPUB");
        self.resources = Rc::new(ArchiveFetcher::new(Rc::new(archive), Rc::clone(&self.fetcher)));
        let spine: Vec<&str> = package.spine.iter().map(String::as_str).collect();
        self.load_items(&spine)?;
        Ok(package)
    }

    fn load_items(&mut self, urls: &[&str]) -> Result<(), ViewerError> {
        let _ = self.scheduler.token().advance();
        self.scheduler.clear();
        self.documents.clear();
        self.location = None;

        let mut documents = Vec::with_capacity(urls.len());
        let mut char_start = 0;
        for url in urls {
            let mut document = Document::load(url, self.resources.as_ref(), &self.options, &self.messages)?;
            document.char_start = char_start;
            char_start += document.text.total();
            documents.push(document);
        }
        for document in &documents {
            self.events.emit(ViewerEvent::Loaded {
                url: document.url.clone(),
            });
        }
        self.messages
            .info("Viewer", format!("{} spine item(s), {char_start} characters", documents.len()));
        self.documents = documents;
        if !self.documents.is_empty() {
            self.location = Some(Location {
                spine: 0,
                page: 0,
                position: FlowPosition::start(),
            });
            self.nav_pending = true;
        }
        self.queue_layout();
        let _ = self.drain_messages();
        Ok(())
    }

    /// Change the options: styles are rebuilt and every page is laid out
    /// again, keeping the current position.
    pub fn set_options(&mut self, options: ViewerOptions) {
        self.options = options;
        let _ = self.scheduler.token().advance();
        self.scheduler.clear();
        for document in &mut self.documents {
            document.restyle(self.resources.as_ref(), &self.options);
        }
        self.nav_pending = self.location.is_some();
        self.queue_layout();
        let _ = self.drain_messages();
    }

    /// Resize the viewport. With `autoresize` the pages are laid out again
    /// for the new size; without it the size is only recorded.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.options.viewport.width = width;
        self.options.viewport.height = height;
        let _ = self.scheduler.token().advance();
        self.scheduler.clear();
        if self.options.autoresize && !self.documents.is_empty() {
            self.events.emit(ViewerEvent::ResizeStart);
            let media = self.options.media();
            for document in &mut self.documents {
                // The style cache survives unless a media query flipped.
                if document.resolver.set_media(media.clone()) {
                    document.flows = FlowMap::build(&document.tree, &mut document.resolver);
                    document.rtl = PageLayout::principal_rtl(&document.tree, &mut document.resolver);
                }
                document.paginator.clear();
            }
            self.resizing = true;
            self.nav_pending = self.location.is_some();
        }
        self.queue_layout();
    }

    fn apply_pending_resize(&mut self) {
        if let Some((width, height)) = self.pending_resize.take() {
            self.resize(width, height);
        }
    }

    /// Queue layout of every unfinished spine item, the current one first.
    /// Without `renderAllPages` only the current item is queued.
    fn queue_layout(&mut self) {
        let current = self.location.as_ref().map_or(0, |l| l.spine);
        let order = (current..self.documents.len()).chain(0..current);
        for spine in order {
            if spine != current && !self.options.render_all_pages {
                break;
            }
            let task = Task::Layout { spine };
            if !self.documents[spine].paginator.is_complete() && !self.scheduler.contains(&task) {
                self.scheduler.push(task);
            }
        }
    }

    /// Run queued tasks until the queue is empty or the time slice is used
    /// up, then deliver events. Returns `true` while work remains.
    pub fn run_slice(&mut self) -> bool {
        let deadline = self.scheduler.deadline();
        loop {
            self.apply_pending_resize();
            let Some(queued) = self.scheduler.next_task() else {
                break;
            };
            match self.run_task(&queued.task, queued.generation) {
                TaskOutcome::Done => {}
                TaskOutcome::Suspend => self.scheduler.requeue(queued),
                TaskOutcome::Failed(err) => self.report(&err),
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        self.apply_pending_resize();
        let _ = self.drain_messages();
        !self.scheduler.is_idle()
    }

    /// Run slices until no work is left.
    pub fn run_until_idle(&mut self) {
        while self.run_slice() {}
    }

    fn run_task(&mut self, task: &Task, generation: u64) -> TaskOutcome<ViewerError> {
        match task {
            Task::Fetch { spine, src, url } => {
                let result = self.resources.fetch(url);
                // The fetch ran to completion; whether its result still
                // matters is only known now.
                if !self.scheduler.token().is_current(generation) {
                    self.scheduler.note_discarded();
                    tracing::debug!(url, "dropping stale fetch result");
                    return TaskOutcome::Done;
                }
                let size = self.measure(url, result);
                if let Some(document) = self.documents.get_mut(*spine) {
                    document.images.insert(src, size);
                }
                TaskOutcome::Done
            }
            Task::Layout { spine } => self.run_layout(*spine, generation),
        }
    }

    fn run_layout(&mut self, spine: usize, generation: u64) -> TaskOutcome<ViewerError> {
        let Some(document) = self.documents.get(spine) else {
            return TaskOutcome::Failed(ViewerError::NoDocument);
        };
        // The page waits for its own images.
        let pending = document.pending_images();
        if !pending.is_empty() {
            for (src, url) in pending {
                let task = Task::Fetch { spine, src, url };
                if !self.scheduler.contains(&task) {
                    self.scheduler.push(task);
                }
            }
            return TaskOutcome::Suspend;
        }

        let base = self.options.page_style();
        let metrics = self.metrics.as_ref();
        let next = match self.documents[spine].layout_next(base, metrics) {
            Ok(Some(next)) => next,
            Ok(None) => return TaskOutcome::Done,
            Err(err) => return TaskOutcome::Failed(err.into()),
        };
        if !self.scheduler.token().is_current(generation) {
            self.scheduler.note_discarded();
            tracing::debug!(spine, "dropping stale page");
            return TaskOutcome::Done;
        }
        let (page, checkpoint) = next;
        self.commit_page(spine, page, checkpoint);

        let document = &self.documents[spine];
        if document.paginator.is_complete() {
            if self.options.render_all_pages
                && let Some(next) = self.documents.get(spine + 1)
                && !next.paginator.is_complete()
            {
                let task = Task::Layout { spine: spine + 1 };
                if !self.scheduler.contains(&task) {
                    self.scheduler.push(task);
                }
            }
            return TaskOutcome::Done;
        }
        if !self.options.render_all_pages && !self.nav_pending {
            return TaskOutcome::Done;
        }
        TaskOutcome::Suspend
    }

    fn measure(&self, url: &str, bytes: Result<Vec<u8>, folio_common::FetchError>) -> Option<(f32, f32)> {
        match bytes.map_err(|e| e.to_string()).and_then(|b| measure_image(url, &b)) {
            Ok(size) => Some(size),
            Err(err) => {
                self.messages.warn("Image", format!("{url}: {err}"));
                None
            }
        }
    }

    fn commit_page(&mut self, spine: usize, page: PageContent, checkpoint: folio_css::Checkpoint) {
        let index = page.index;
        self.documents[spine].commit(page, checkpoint);
        self.events.emit(ViewerEvent::PageLaid { spine, page: index });

        if !self.nav_pending {
            return;
        }
        let Some(location) = self.location.as_mut() else {
            return;
        };
        if location.spine != spine {
            return;
        }
        if let Some(found) = self.documents[spine].paginator.page_for_position(&location.position) {
            location.page = found;
            self.nav_pending = false;
            if self.resizing {
                self.resizing = false;
                self.events.emit(ViewerEvent::ResizeEnd);
            }
            if let Err(err) = self.emit_nav() {
                self.report(&err);
            }
        }
    }

    /// Error boundary of a task: report and go on.
    fn report(&mut self, err: &ViewerError) {
        self.messages.error("Viewer", err.to_string());
        self.events.emit(ViewerEvent::Error {
            message: err.to_string(),
        });
    }

    /// Forward pending engine messages to the listeners and deliver every
    /// queued event. Returns the delivered events.
    pub fn drain_messages(&mut self) -> Vec<ViewerEvent> {
        for message in self.messages.drain() {
            self.events.emit(message.into());
        }
        self.events.dispatch()
    }

    // Synchronous layout, for navigation past the laid-out pages.

    fn load_images_now(&mut self, spine: usize) {
        let Some(document) = self.documents.get(spine) else {
            return;
        };
        for (src, url) in document.pending_images() {
            let result = self.resources.fetch(&url);
            let size = self.measure(&url, result);
            self.documents[spine].images.insert(&src, size);
        }
    }

    /// Lay out and commit one more page of `spine`. `false` when it was
    /// already complete.
    fn layout_one_now(&mut self, spine: usize) -> Result<bool, ViewerError> {
        self.load_images_now(spine);
        let base = self.options.page_style();
        let metrics = self.metrics.as_ref();
        let document = self.documents.get_mut(spine).ok_or(ViewerError::NoDocument)?;
        match document.layout_next(base, metrics)? {
            Some((page, checkpoint)) => {
                self.commit_page(spine, page, checkpoint);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ensure_page(&mut self, spine: usize, page: usize) -> Result<(), ViewerError> {
        while self.documents[spine].paginator.len() <= page {
            if !self.layout_one_now(spine)? {
                break;
            }
        }
        Ok(())
    }

    fn ensure_position(&mut self, spine: usize, position: &FlowPosition) -> Result<(), ViewerError> {
        while self.documents[spine].paginator.page_for_position(position).is_none() {
            if !self.layout_one_now(spine)? {
                break;
            }
        }
        Ok(())
    }

    fn complete_document(&mut self, spine: usize) -> Result<(), ViewerError> {
        while self.layout_one_now(spine)? {}
        Ok(())
    }

    /// Global index of the first page of `spine`. Earlier spine items are
    /// laid out completely.
    fn page_offset(&mut self, spine: usize) -> Result<usize, ViewerError> {
        let mut offset = 0;
        for earlier in 0..spine {
            self.complete_document(earlier)?;
            offset += self.documents[earlier].paginator.len();
        }
        Ok(offset)
    }

    /// Spine item and local index of global page `index`.
    fn locate(&mut self, index: usize) -> Result<(usize, usize), ViewerError> {
        if self.documents.is_empty() {
            return Err(ViewerError::NoDocument);
        }
        let mut remaining = index;
        for spine in 0..self.documents.len() {
            self.ensure_page(spine, remaining)?;
            let len = self.documents[spine].paginator.len();
            if remaining < len {
                return Ok((spine, remaining));
            }
            remaining -= len;
        }
        Err(ViewerError::PageOutOfRange {
            index,
            count: index - remaining,
        })
    }

    /// Page at global `index`, laid out if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::PageOutOfRange`] past the last page.
    pub fn page(&mut self, index: usize) -> Result<&PageContent, ViewerError> {
        let (spine, local) = self.locate(index)?;
        self.documents[spine]
            .paginator
            .page(local)
            .ok_or(ViewerError::PageOutOfRange { index, count: index })
    }

    /// Number of pages in the spine. Lays out everything not laid out yet.
    ///
    /// # Errors
    ///
    /// Returns the error of a page that cannot be laid out.
    pub fn page_count(&mut self) -> Result<usize, ViewerError> {
        let spines = self.documents.len();
        self.page_offset(spines)
    }

    /// Global index of the page being viewed.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::NoDocument`] before a document is loaded.
    pub fn current_page(&mut self) -> Result<usize, ViewerError> {
        let location = self.location.clone().ok_or(ViewerError::NoDocument)?;
        Ok(self.page_offset(location.spine)? + location.page)
    }

    /// CFI of the position being viewed. After navigating to a CFI this is
    /// the same location.
    #[must_use]
    pub fn current_cfi(&self) -> Option<String> {
        self.current_cfi_value().map(|cfi| cfi.to_string())
    }

    fn current_cfi_value(&self) -> Option<Cfi> {
        let location = self.location.as_ref()?;
        let document = self.documents.get(location.spine)?;
        Some(Cfi::from_position(&document.tree, &location.position, Some(location.spine)))
    }

    /// EPage of the position being viewed.
    #[must_use]
    pub fn current_epage(&self) -> Option<f64> {
        let location = self.location.as_ref()?;
        let document = self.documents.get(location.spine)?;
        Some(epage_of(document.char_start + document.text.offset_of(&location.position)))
    }

    /// EPages in the whole spine.
    #[must_use]
    pub fn epage_count(&self) -> f64 {
        epage_of(self.documents.iter().map(|d| d.text.total()).sum())
    }

    /// `f=<cfi>` fragment for the position being viewed, to persist the
    /// reading position in a URL.
    #[must_use]
    pub fn fragment(&self) -> Option<String> {
        self.current_cfi_value().map(|cfi| cfi.to_fragment())
    }

    /// Go to the position in a fragment written by [`Self::fragment`].
    /// Fragments that are not of that form are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`ViewerError`] when the position cannot be laid out.
    pub fn set_fragment(&mut self, fragment: &str) -> Result<Option<usize>, ViewerError> {
        let result = match Cfi::from_fragment(fragment) {
            None => Ok(None),
            Some(Ok(cfi)) => self.goto_cfi(&cfi).map(Some),
            Some(Err(err)) => {
                self.messages.warn("CFI", format!("ignoring fragment: {err}"));
                Ok(None)
            }
        };
        let _ = self.drain_messages();
        result
    }

    /// Navigate to `target` and return the global page index shown.
    ///
    /// Targets that resolve to nothing (a missing id, a malformed CFI, a CFI
    /// step with no node) are reported as warnings and leave the view where
    /// it was.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::NoDocument`] before loading and
    /// [`ViewerError::PageOutOfRange`] for a page past the end.
    pub fn navigate(&mut self, target: Target) -> Result<usize, ViewerError> {
        if self.documents.is_empty() {
            return Err(ViewerError::NoDocument);
        }
        let result = match target {
            Target::Page(index) => self.goto_page(index),
            Target::First => self.goto_page(0),
            Target::Last => {
                let count = self.page_count()?;
                self.goto_page(count.saturating_sub(1))
            }
            Target::Next => {
                let last = self.visible_pages()?.into_iter().max().unwrap_or(0);
                match self.goto_page(last + 1) {
                    Err(ViewerError::PageOutOfRange { .. }) => self.current_page(),
                    other => other,
                }
            }
            Target::Previous => {
                let first = self.visible_pages()?.into_iter().min().unwrap_or(0);
                match first.checked_sub(1) {
                    Some(index) => self.goto_page(index),
                    None => self.current_page(),
                }
            }
            Target::EPage(epage) => self.goto_epage(epage),
            Target::Cfi(text) => match Cfi::parse(&text) {
                Ok(cfi) => self.goto_cfi(&cfi),
                Err(err) => self.ignore_cfi(&err),
            },
            Target::Url(href) => self.navigate_to_internal_url(&href),
        };
        let _ = self.drain_messages();
        result
    }

    /// Follow a link from the current document. Links into the spine
    /// navigate; other links are reported as `hyperlink` events.
    ///
    /// # Errors
    ///
    /// Returns a [`ViewerError`] when the target cannot be laid out.
    pub fn navigate_to_internal_url(&mut self, href: &str) -> Result<usize, ViewerError> {
        let location = self.location.clone().ok_or(ViewerError::NoDocument)?;
        let base_url = self.documents[location.spine].url.clone();
        let (path, fragment) = split_fragment(href);
        let resolved = resolve_url(href, Some(&base_url));
        let target = split_fragment(&resolved).0;
        let spine = if path.is_empty() {
            Some(location.spine)
        } else {
            self.documents.iter().position(|d| split_fragment(&d.url).0 == target)
        };
        self.events.emit(ViewerEvent::Hyperlink {
            href: resolved.clone(),
            internal: spine.is_some(),
        });
        let Some(spine) = spine else {
            return self.current_page();
        };

        match fragment {
            None | Some("") => self.goto_position(spine, FlowPosition::start()),
            Some(fragment) => match Cfi::from_fragment(fragment) {
                Some(Ok(cfi)) => {
                    let position = cfi.start().resolve(&self.documents[spine].tree);
                    self.goto_resolved(spine, position)
                }
                Some(Err(err)) => self.ignore_cfi(&err),
                None => {
                    let id = String::from_utf8_lossy(&percent_decode(fragment)).into_owned();
                    let document = &self.documents[spine];
                    match document.tree.element_by_id(&id) {
                        Some(node) => {
                            let position = FlowPosition::before(&document.tree, node);
                            self.goto_position(spine, position)
                        }
                        None => {
                            self.messages.warn("Viewer", format!("no element with id {id:?} in {target}"));
                            self.current_page()
                        }
                    }
                }
            },
        }
    }

    fn goto_page(&mut self, index: usize) -> Result<usize, ViewerError> {
        let (spine, local) = self.locate(index)?;
        let position = self.documents[spine]
            .paginator
            .page(local)
            .map_or_else(FlowPosition::start, |p| p.start.clone());
        self.location = Some(Location {
            spine,
            page: local,
            position,
        });
        self.emit_nav()?;
        Ok(index)
    }

    fn goto_epage(&mut self, epage: f64) -> Result<usize, ViewerError> {
        let offset = offset_of_epage(epage);
        let spine = self
            .documents
            .iter()
            .rposition(|d| d.char_start <= offset)
            .unwrap_or(0);
        let document = &self.documents[spine];
        let position = document
            .text
            .position_at(&document.tree, offset - document.char_start.min(offset));
        self.goto_position(spine, position)
    }

    fn goto_cfi(&mut self, cfi: &Cfi) -> Result<usize, ViewerError> {
        let spine = match cfi.path.spine_index() {
            Some(spine) => spine,
            None => self.location.as_ref().map_or(0, |l| l.spine),
        };
        let Some(document) = self.documents.get(spine) else {
            return self.ignore_cfi(&CfiError::NotInSpine);
        };
        let position = cfi.start().resolve(&document.tree);
        self.goto_resolved(spine, position)
    }

    fn goto_resolved(&mut self, spine: usize, position: Result<FlowPosition, CfiError>) -> Result<usize, ViewerError> {
        match position {
            Ok(position) => self.goto_position(spine, position),
            Err(err) => self.ignore_cfi(&err),
        }
    }

    /// A CFI that does not parse or resolve leaves the view where it was.
    fn ignore_cfi(&mut self, err: &CfiError) -> Result<usize, ViewerError> {
        self.messages.warn("CFI", format!("navigation ignored: {err}"));
        self.current_page()
    }

    /// Show the page holding `position`, starting layout from the last
    /// committed page if it is not laid out yet.
    fn goto_position(&mut self, spine: usize, position: FlowPosition) -> Result<usize, ViewerError> {
        self.ensure_position(spine, &position)?;
        let paginator = &self.documents[spine].paginator;
        let page = paginator
            .page_for_position(&position)
            .unwrap_or_else(|| paginator.len().saturating_sub(1));
        self.location = Some(Location { spine, page, position });
        self.nav_pending = false;
        self.emit_nav()?;
        Ok(self.page_offset(spine)? + page)
    }

    fn emit_nav(&mut self) -> Result<(), ViewerError> {
        let Some(location) = self.location.clone() else {
            return Ok(());
        };
        let page = self.page_offset(location.spine)? + location.page;
        let document = &self.documents[location.spine];
        let epage = epage_of(document.char_start + document.text.offset_of(&location.position));
        let cfi = Cfi::from_position(&document.tree, &location.position, Some(location.spine)).to_string();
        let side = document
            .paginator
            .page(location.page)
            .map(|p| p.side.to_string())
            .unwrap_or_default();
        self.events.emit(ViewerEvent::Nav { page, epage, cfi, side });
        Ok(())
    }

    /// Direction pages are turned in, from the writing mode of the current
    /// document's root element.
    #[must_use]
    pub fn page_progression(&self) -> PageProgression {
        let spine = self.location.as_ref().map_or(0, |l| l.spine);
        match self.documents.get(spine) {
            Some(document) if document.rtl => PageProgression::Rtl,
            _ => PageProgression::Ltr,
        }
    }

    /// The pages shown together: the current page's spread in spread view,
    /// otherwise the current page alone on its side.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::NoDocument`] before loading.
    pub fn current_spread(&mut self) -> Result<Spread, ViewerError> {
        let location = self.location.clone().ok_or(ViewerError::NoDocument)?;
        let offset = self.page_offset(location.spine)?;
        let rtl = self.documents[location.spine].rtl;
        let local = location.page;
        let side = self.documents[location.spine]
            .paginator
            .page(local)
            .map_or_else(|| PageSide::for_index(local, rtl), |p| p.side);

        let mut spread = Spread::default();
        let mut place = |page: usize, side: PageSide| match side {
            PageSide::Left => spread.left = Some(offset + page),
            PageSide::Right => spread.right = Some(offset + page),
        };
        place(local, side);
        if self.options.spread_view {
            // The page turned to first opens the spread.
            let opening = if rtl { PageSide::Right } else { PageSide::Left };
            if side == opening {
                self.ensure_page(location.spine, local + 1)?;
                if let Some(partner) = self.documents[location.spine].paginator.page(local + 1) {
                    place(local + 1, partner.side);
                }
            } else if let Some(previous) = local.checked_sub(1)
                && let Some(partner) = self.documents[location.spine].paginator.page(previous)
                && partner.side == opening
            {
                place(previous, partner.side);
            }
        }
        Ok(spread)
    }

    fn visible_pages(&mut self) -> Result<Vec<usize>, ViewerError> {
        Ok(self.current_spread()?.pages().collect())
    }

    /// Scale at which the current page (or spread) fits the viewport.
    #[must_use]
    pub fn query_zoom_factor(&self, zoom: ZoomType) -> f32 {
        let ZoomType::FitInsideViewport = zoom;
        let style = self
            .location
            .as_ref()
            .and_then(|l| self.documents.get(l.spine)?.paginator.page(l.page))
            .map_or_else(|| self.options.page_style(), |p| p.style.clone());
        let pages = if self.options.spread_view { 2.0 } else { 1.0 };
        let width = style.width * pages;
        let viewport = &self.options.viewport;
        if width <= 0.0 || style.height <= 0.0 {
            return 1.0;
        }
        (viewport.width / width).min(viewport.height / style.height)
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("documents", &self.documents.len())
            .field("scheduler", &self.scheduler)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
