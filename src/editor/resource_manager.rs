//! Page resources and contents for injection.
//!
//! Merges injected fonts and images into a page's `/Resources` without
//! touching existing entries, and appends new content streams to
//! `/Contents`.

use super::placement::ImageHandle;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use std::collections::{HashMap, HashSet};

/// Prefix of injected font resource names.
const FONT_PREFIX: &str = "InjF";
/// Prefix of injected image resource names.
const IMAGE_PREFIX: &str = "InjIm";

/// Resource dictionary of one page under modification.
///
/// Allocates names like `/InjF1` and `/InjIm1` that do not collide with
/// anything already in the page's `/Font` or `/XObject` dictionaries.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    /// Working copy of the page's effective resources
    resources: Dict,

    /// Registered font name → resource name
    fonts: HashMap<String, String>,

    /// Font name allocation counter
    next_font_id: u32,

    /// Image handle → resource name
    images: HashMap<ImageHandle, String>,

    /// XObject allocation counter
    next_image_id: u32,
}

impl ResourceManager {
    /// Start from the page's effective resources: its own `/Resources`
    /// (direct or referenced) or the nearest inherited one.
    ///
    /// `/Font` and `/XObject` sub-dictionaries given by reference are
    /// copied in, so the result can be written back as a direct page-local
    /// dictionary without affecting other pages.
    pub fn for_page(doc: &Document, page: &Dict) -> Result<Self> {
        let source = match page.get("Resources") {
            Some(obj) => Some(obj.clone()),
            None => inherited_resources(doc, page)?,
        };
        let mut resources = match source {
            Some(obj) => expect_dict(doc.resolve(&obj)?, "Resources")?,
            None => Dict::new(),
        };

        for category in ["Font", "XObject"] {
            if let Some(entry @ Object::Reference(_)) = resources.get(category).cloned() {
                let resolved = expect_dict(doc.resolve(&entry)?, category)?;
                resources.insert(category.to_string(), Object::Dictionary(resolved));
            }
        }

        Ok(Self {
            resources,
            fonts: HashMap::new(),
            next_font_id: 1,
            images: HashMap::new(),
            next_image_id: 1,
        })
    }

    /// Resource name for font object `font_ref`, registering it on first use.
    pub fn font_resource(&mut self, font_name: &str, font_ref: u32) -> Result<String> {
        if let Some(name) = self.fonts.get(font_name) {
            return Ok(name.clone());
        }
        let name = allocate(
            &mut self.resources,
            "Font",
            FONT_PREFIX,
            &mut self.next_font_id,
            font_ref,
        )?;
        log::debug!("Font '{}' is /{} on this page", font_name, name);
        self.fonts.insert(font_name.to_string(), name.clone());
        Ok(name)
    }

    /// Resource name for image object `image_ref`, registering it on first
    /// use.
    pub fn image_resource(&mut self, image: ImageHandle, image_ref: u32) -> Result<String> {
        if let Some(name) = self.images.get(&image) {
            return Ok(name.clone());
        }
        let name = allocate(
            &mut self.resources,
            "XObject",
            IMAGE_PREFIX,
            &mut self.next_image_id,
            image_ref,
        )?;
        log::debug!("Image {} is /{} on this page", image.index(), name);
        self.images.insert(image, name.clone());
        Ok(name)
    }

    /// The merged resource dictionary.
    pub fn resources(&self) -> &Dict {
        &self.resources
    }

    /// Consume the manager, returning the merged resource dictionary.
    pub fn into_resources(self) -> Dict {
        self.resources
    }
}

/// First free `{prefix}{n}` in `resources[category]`, bound to `target`.
fn allocate(
    resources: &mut Dict,
    category: &str,
    prefix: &str,
    counter: &mut u32,
    target: u32,
) -> Result<String> {
    let entry = resources
        .entry(category.to_string())
        .or_insert_with(|| Object::Dictionary(Dict::new()));
    let dict = match entry {
        Object::Dictionary(dict) => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    let name = loop {
        let candidate = format!("{}{}", prefix, *counter);
        *counter += 1;
        if !dict.contains_key(&candidate) {
            break candidate;
        }
    };
    dict.insert(name.clone(), Object::reference(target));
    Ok(name)
}

/// `/Resources` of the nearest ancestor that has one.
fn inherited_resources(doc: &Document, page: &Dict) -> Result<Option<Object>> {
    let mut visited = HashSet::new();
    let mut parent = page.get("Parent").and_then(Object::as_reference);
    while let Some(node_ref) = parent {
        if !visited.insert(node_ref.id) {
            log::warn!("Cycle in /Parent chain at object {}", node_ref.id);
            break;
        }
        let node = doc.load_dict(node_ref.id)?;
        if let Some(resources) = node.get("Resources") {
            return Ok(Some(resources.clone()));
        }
        parent = node.get("Parent").and_then(Object::as_reference);
    }
    Ok(None)
}

/// Set `/Contents` to `[prefix_id, existing..., content_id]`.
///
/// The prefix stream saves the graphics state so the injected stream can
/// restore it, whatever state the existing streams leave behind.
pub fn append_contents(doc: &Document, page: &mut Dict, prefix_id: u32, content_id: u32) -> Result<()> {
    let existing = match page.get("Contents") {
        None => Vec::new(),
        Some(Object::Reference(r)) => {
            let target = doc.get(r.id).ok_or(Error::ObjectNotFound(r.id, r.gen))?;
            if target.payload.starts_with(b"[") {
                match target.parse()? {
                    Object::Array(items) => items,
                    _ => vec![Object::Reference(*r)],
                }
            } else {
                vec![Object::Reference(*r)]
            }
        },
        Some(Object::Array(items)) => items.clone(),
        Some(other) => {
            return Err(Error::InvalidObjectType {
                expected: "Reference or Array".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::reference(prefix_id));
    contents.extend(existing);
    contents.push(Object::reference(content_id));
    page.insert("Contents".to_string(), Object::Array(contents));
    Ok(())
}

fn expect_dict(obj: Object, what: &str) -> Result<Dict> {
    match obj {
        Object::Dictionary(dict) => Ok(dict),
        other => Err(Error::InvalidObjectType {
            expected: format!("{} dictionary", what),
            found: other.type_name().to_string(),
        }),
    }
}
