//! Loading documents and reading their pages.

use crate::object::dict::keys::*;
use crate::object::{Array, Dict, Name, Object, Rect, Stream};
use crate::xref::{self, XRef};
use log::warn;
use std::sync::Arc;

// Page trees nested deeper than this are most likely cyclic.
const MAX_TREE_DEPTH: u32 = 64;

/// The size of an A4 page, used when a page doesn't declare a media box.
pub const A4: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 595.276,
    y1: 841.89,
};

/// An error that can occur while loading a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The data doesn't start with a `%PDF-` header.
    #[error("the data doesn't start with a document header")]
    InvalidHeader,
    /// No document catalog could be found, even after rebuilding the xref table.
    #[error("the document has no catalog")]
    MissingCatalog,
    /// The page tree doesn't contain any pages.
    #[error("the document has no pages")]
    NoPages,
}

/// A loaded document.
#[derive(Debug, Clone)]
pub struct Document {
    xref: XRef,
    trailer: Dict,
    pages: Vec<Page>,
}

impl Document {
    /// Load a document from its bytes.
    ///
    /// Objects are only parsed once they are accessed, so loading a document is cheap.
    pub fn load(data: impl Into<Arc<[u8]>>) -> Result<Self, LoadError> {
        let data = data.into();

        // Some producers put garbage in front of the header.
        let head = data.get(..data.len().min(1024)).unwrap_or_default();
        if !head.windows(5).any(|w| w == b"%PDF-") {
            return Err(LoadError::InvalidHeader);
        }

        let (xref, trailer) = xref::load(data).ok_or(LoadError::MissingCatalog)?;
        let catalog = trailer
            .get::<Dict>(ROOT)
            .ok_or(LoadError::MissingCatalog)?;
        let root = catalog.get::<Dict>(PAGES).ok_or(LoadError::NoPages)?;

        let mut pages = vec![];
        collect_pages(&root, Inherited::default(), &mut pages, 0);

        if pages.is_empty() {
            return Err(LoadError::NoPages);
        }

        Ok(Self {
            xref,
            trailer,
            pages,
        })
    }

    /// Return the pages of the document, in order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Return the cross-reference table of the document.
    pub fn xref(&self) -> &XRef {
        &self.xref
    }

    /// Return the trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }
}

// Attributes that pages inherit from their ancestors in the page tree.
#[derive(Debug, Clone, Default)]
struct Inherited {
    media_box: Option<Rect>,
    crop_box: Option<Rect>,
    resources: Option<Resources>,
}

impl Inherited {
    fn extend(&self, node: &Dict) -> Self {
        let parent = self.resources.clone().unwrap_or_default();

        Self {
            media_box: node.get::<Rect>(MEDIA_BOX).or(self.media_box),
            crop_box: node.get::<Rect>(CROP_BOX).or(self.crop_box),
            resources: Some(match node.get::<Dict>(RESOURCES) {
                Some(dict) => Resources::from_parent(dict, parent),
                None => parent,
            }),
        }
    }
}

fn collect_pages(node: &Dict, inherited: Inherited, pages: &mut Vec<Page>, depth: u32) {
    if depth > MAX_TREE_DEPTH {
        warn!("page tree is nested too deeply");

        return;
    }

    let inherited = inherited.extend(node);

    let Some(kids) = node.get::<Array>(KIDS) else {
        warn!("page tree node has no kids");

        return;
    };

    for kid in kids.iter::<Dict>() {
        match kid.get::<Name>(TYPE).as_deref() {
            Some(PAGES) => collect_pages(&kid, inherited.clone(), pages, depth + 1),
            // Be lenient about a missing or wrong type.
            _ => pages.push(Page::new(kid, &inherited)),
        }
    }
}

/// A page of a document.
#[derive(Debug, Clone)]
pub struct Page {
    dict: Dict,
    media_box: Rect,
    crop_box: Rect,
    resources: Resources,
}

impl Page {
    fn new(dict: Dict, inherited: &Inherited) -> Self {
        let inherited = inherited.extend(&dict);
        let media_box = inherited.media_box.unwrap_or(A4);
        let crop_box = inherited
            .crop_box
            .map_or(media_box, |crop_box| crop_box.intersect(media_box));

        Self {
            dict,
            media_box,
            crop_box,
            resources: inherited.resources.unwrap_or_default(),
        }
    }

    /// The media box of the page.
    pub fn media_box(&self) -> Rect {
        self.media_box
    }

    /// The crop box of the page, clipped to and defaulting to the media box.
    pub fn crop_box(&self) -> Rect {
        self.crop_box
    }

    /// The resources of the page, including the ones inherited from the page tree.
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// The raw page dictionary.
    pub fn raw(&self) -> &Dict {
        &self.dict
    }

    /// Return the decoded content stream of the page.
    ///
    /// If the page has several content streams, they are concatenated with a newline in
    /// between, since an operator may not span two streams.
    pub fn content(&self) -> Option<Vec<u8>> {
        if let Some(stream) = self.dict.get::<Stream>(CONTENTS) {
            return stream.decoded();
        }

        let Some(array) = self.dict.get::<Array>(CONTENTS) else {
            warn!("contents of page are neither a stream nor an array");

            return None;
        };

        let mut collected = vec![];

        for stream in array.iter::<Stream>() {
            match stream.decoded() {
                Some(data) => {
                    collected.extend(data);
                    collected.push(b'\n');
                }
                None => warn!("failed to decode a content stream of the page"),
            }
        }

        Some(collected)
    }
}

/// The named resources that are available to a content stream.
///
/// Resources form a chain: names are first looked up in the innermost dictionary, then in
/// its parents. This is how form XObjects, patterns and soft masks inherit the resources of
/// the content stream they are used in.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    parent: Option<Arc<Resources>>,
    ext_g_states: Dict,
    color_spaces: Dict,
    patterns: Dict,
    shadings: Dict,
    x_objects: Dict,
}

impl Resources {
    /// Create a new resource scope without a parent.
    pub fn new(dict: Dict) -> Self {
        Self::with_parent(dict, None)
    }

    /// Create a new resource scope whose names override the ones of `parent`.
    pub fn from_parent(dict: Dict, parent: Self) -> Self {
        Self::with_parent(dict, Some(Arc::new(parent)))
    }

    fn with_parent(dict: Dict, parent: Option<Arc<Self>>) -> Self {
        let sub = |key: &[u8]| dict.get::<Dict>(key).unwrap_or_default();

        Self {
            ext_g_states: sub(EXT_G_STATE),
            color_spaces: sub(COLORSPACE),
            patterns: sub(PATTERN),
            shadings: sub(SHADING),
            x_objects: sub(XOBJECT),
            parent,
        }
    }

    fn lookup<T>(&self, select: impl Fn(&Self) -> Option<T>) -> Option<T> {
        let mut scope = Some(self);

        while let Some(current) = scope {
            if let Some(found) = select(current) {
                return Some(found);
            }

            scope = current.parent.as_deref();
        }

        None
    }

    /// Look up an extended graphics state.
    pub fn ext_g_state(&self, name: &[u8]) -> Option<Dict> {
        self.lookup(|r| r.ext_g_states.get::<Dict>(name))
    }

    /// Look up a colour space.
    pub fn color_space(&self, name: &[u8]) -> Option<Object> {
        self.lookup(|r| r.color_spaces.get::<Object>(name))
    }

    /// Look up a pattern, which is either a dictionary (shading pattern) or a stream
    /// (tiling pattern).
    pub fn pattern(&self, name: &[u8]) -> Option<Object> {
        self.lookup(|r| r.patterns.get::<Object>(name))
    }

    /// Look up a shading.
    pub fn shading(&self, name: &[u8]) -> Option<Object> {
        self.lookup(|r| r.shadings.get::<Object>(name))
    }

    /// Look up an XObject.
    pub fn x_object(&self, name: &[u8]) -> Option<Stream> {
        self.lookup(|r| r.x_objects.get::<Stream>(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // No xref table, so the reader has to rebuild it.
    const DOC: &[u8] = b"%PDF-1.4
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 200 100]
   /Resources << /ExtGState << /G0 << /CA 0.5 >> >> >> >>
endobj
3 0 obj
<< /Type /Page /Parent 2 0 R /Contents [5 0 R 6 0 R]
   /Resources << /ExtGState << /G1 << /ca 0.25 >> >> >> >>
endobj
4 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 50 50] /CropBox [10 10 40 40] /Contents 5 0 R >>
endobj
5 0 obj
<< /Length 7 >>
stream
0 0 m 1
endstream
endobj
6 0 obj
<< /Length 5 >>
stream
1 l S
endstream
endobj
%%EOF";

    #[test]
    fn pages_inherit_attributes() {
        let doc = Document::load(DOC).unwrap();
        assert!(doc.xref().is_repaired());
        assert_eq!(doc.pages().len(), 2);

        let first = &doc.pages()[0];
        assert_eq!(first.media_box(), Rect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(first.crop_box(), first.media_box());
        assert!(first.resources().ext_g_state(b"G0").is_some());
        assert!(first.resources().ext_g_state(b"G1").is_some());

        let second = &doc.pages()[1];
        assert_eq!(second.media_box(), Rect::new(0.0, 0.0, 50.0, 50.0));
        assert_eq!(second.crop_box(), Rect::new(10.0, 10.0, 40.0, 40.0));
        assert!(second.resources().ext_g_state(b"G0").is_some());
        assert!(second.resources().ext_g_state(b"G1").is_none());
    }

    #[test]
    fn content_streams_are_concatenated() {
        let doc = Document::load(DOC).unwrap();
        assert_eq!(doc.pages()[0].content().unwrap(), b"0 0 m 1\n1 l S\n");
        assert_eq!(doc.pages()[1].content().unwrap(), b"0 0 m 1");
    }

    #[test]
    fn child_resources_override_parent() {
        let parent = Resources::new(Dict::from_bytes(b"<< /ExtGState << /A << /CA 1 >> >> >>").unwrap());
        let child = Resources::from_parent(
            Dict::from_bytes(b"<< /ExtGState << /A << /CA 0 >> >> >>").unwrap(),
            parent,
        );

        assert_eq!(child.ext_g_state(b"A").unwrap().get::<f32>(CA), Some(0.0));
    }

    #[test]
    fn load_errors() {
        assert_eq!(Document::load(b"garbage".as_slice()).unwrap_err(), LoadError::InvalidHeader);
        assert_eq!(
            Document::load(b"%PDF-1.4\n1 0 obj\n<< /A 1 >>\nendobj".as_slice()).unwrap_err(),
            LoadError::MissingCatalog
        );
        assert_eq!(
            Document::load(b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj".as_slice())
                .unwrap_err(),
            LoadError::NoPages
        );
    }
}
