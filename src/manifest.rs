//! Namespace-aware parsing of the package's `imsmanifest.xml` descriptor.
//!
//! Manifests are tried against the full candidate encoding list; the first
//! encoding that both decodes cleanly and yields well-formed XML wins. The
//! extraction itself is deliberately shallow: title, description,
//! organizations and the resource/file listings, in document order.

use std::fmt;
use std::path::Path;

use encoding_rs::UTF_8;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use tracing::{debug, info};

use crate::encoding::{encoding_for_name, CANDIDATE_ENCODINGS};

/// IMS content-packaging schema namespace.
pub const NS_IMSCP: &str = "http://www.imsglobal.org/xsd/imscp_v1p1";
/// ADL SCORM extension namespace.
pub const NS_ADLCP: &str = "http://www.adlnet.org/xsd/adlcp_v1p3";
/// IMS metadata schema namespace.
pub const NS_IMSMD: &str = "http://www.imsglobal.org/xsd/imsmd_v1p2";

/// One `<organization>` entry, in document order.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Organization {
    pub identifier: String,
    pub title: String,
}

/// One `<resource>` entry with its declared file listing, in document order.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Resource {
    pub identifier: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub href: String,
    pub files: Vec<String>,
}

/// Metadata extracted from a parsed manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub organizations: Vec<Organization>,
    pub resources: Vec<Resource>,
    /// Name of the encoding that produced the successful parse.
    pub encoding_used: String,
}

#[derive(Debug)]
pub enum ManifestError {
    Io(std::io::Error),
    /// The manifest is not well-formed XML under any tried encoding.
    Parse(quick_xml::Error),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io(e) => write!(f, "failed to read manifest: {e}"),
            ManifestError::Parse(e) => {
                write!(f, "manifest is not valid XML under any tried encoding: {e}")
            }
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManifestError::Io(e) => Some(e),
            ManifestError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ManifestError {
    fn from(e: std::io::Error) -> Self {
        ManifestError::Io(e)
    }
}

/// Parses a manifest file, trying each candidate encoding in turn.
pub fn parse_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let bytes = std::fs::read(path)?;

    for name in CANDIDATE_ENCODINGS {
        let encoding = encoding_for_name(name);
        let (decoded, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            debug!(path = %path.display(), encoding = name, "Manifest decode rejected");
            continue;
        }
        match parse_manifest_xml(&decoded) {
            Ok(mut manifest) => {
                info!(path = %path.display(), encoding = name, "Manifest parsed");
                manifest.encoding_used = (*name).to_string();
                return Ok(manifest);
            }
            Err(e) => {
                debug!(path = %path.display(), encoding = name, error = ?e, "Manifest parse rejected");
            }
        }
    }

    // Last resort: decode as UTF-8 with replacement and let a parse failure
    // propagate as the fatal error.
    let (decoded, _, _) = UTF_8.decode(&bytes);
    let mut manifest = parse_manifest_xml(&decoded).map_err(ManifestError::Parse)?;
    manifest.encoding_used = "utf-8 (lossy)".to_string();
    Ok(manifest)
}

fn resolved_ns(res: ResolveResult<'_>) -> Option<Vec<u8>> {
    match res {
        ResolveResult::Bound(Namespace(ns)) => Some(ns.to_vec()),
        _ => None,
    }
}

fn ns_is(ns: &Option<Vec<u8>>, uri: &str) -> bool {
    ns.as_deref() == Some(uri.as_bytes())
}

fn attr_value(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    for attr in element.attributes().with_checks(false) {
        let attr = attr.ok()?;
        if attr.key.local_name().as_ref() == key {
            if let Ok(value) = attr.unescape_value() {
                return Some(value.into_owned());
            }
        }
    }
    None
}

/// Which text node is currently being accumulated.
#[derive(Debug, PartialEq)]
enum Capture {
    None,
    Title,
    Description,
    OrgTitle,
}

fn parse_manifest_xml(xml: &str) -> Result<Manifest, quick_xml::Error> {
    let mut reader = NsReader::from_str(xml);
    let mut manifest = Manifest::default();

    // Element stack of (namespace, local name); depth = stack.len().
    let mut stack: Vec<(Option<Vec<u8>>, Vec<u8>)> = Vec::new();

    let mut capture = Capture::None;
    let mut capture_depth = 0usize;
    let mut capture_buf = String::new();
    let mut title_seen = false;
    let mut description_seen = false;

    let mut current_org: Option<Organization> = None;
    let mut org_depth = 0usize;
    let mut current_resource: Option<Resource> = None;
    let mut resource_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let (res, local) = reader.resolve_element(e.name());
                let ns = resolved_ns(res);
                let local: Vec<u8> = local.as_ref().to_vec();
                let parent_local: Option<Vec<u8>> = stack.last().map(|(_, l)| l.clone());
                let parent_local = parent_local.as_deref();
                stack.push((ns.clone(), local.clone()));

                if capture == Capture::None {
                    if ns_is(&ns, NS_IMSMD) && local == b"title" && !title_seen {
                        title_seen = true;
                        capture = Capture::Title;
                        capture_depth = stack.len();
                        capture_buf.clear();
                    } else if ns_is(&ns, NS_IMSMD) && local == b"description" && !description_seen {
                        description_seen = true;
                        capture = Capture::Description;
                        capture_depth = stack.len();
                        capture_buf.clear();
                    }
                }

                if ns_is(&ns, NS_IMSCP) {
                    match local.as_slice() {
                        b"organization" if parent_local == Some(b"organizations".as_slice()) => {
                            current_org = Some(Organization {
                                identifier: attr_value(&e, b"identifier").unwrap_or_default(),
                                title: String::new(),
                            });
                            org_depth = stack.len();
                        }
                        b"title"
                            if current_org.is_some()
                                && capture == Capture::None
                                && stack.len() == org_depth + 1 =>
                        {
                            capture = Capture::OrgTitle;
                            capture_depth = stack.len();
                            capture_buf.clear();
                        }
                        b"resource" if parent_local == Some(b"resources".as_slice()) => {
                            current_resource = Some(Resource {
                                identifier: attr_value(&e, b"identifier").unwrap_or_default(),
                                resource_type: attr_value(&e, b"type").unwrap_or_default(),
                                href: attr_value(&e, b"href").unwrap_or_default(),
                                files: Vec::new(),
                            });
                            resource_depth = stack.len();
                        }
                        b"file" => {
                            if let Some(resource) = current_resource.as_mut() {
                                if stack.len() == resource_depth + 1 {
                                    if let Some(href) = attr_value(&e, b"href") {
                                        resource.files.push(href);
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Empty(e) => {
                let (res, local) = reader.resolve_element(e.name());
                let ns = resolved_ns(res);
                let parent_local: Option<&[u8]> = stack.last().map(|(_, l)| l.as_slice());

                if ns_is(&ns, NS_IMSCP) {
                    match local.as_ref() {
                        b"organization" if parent_local == Some(b"organizations".as_slice()) => {
                            manifest.organizations.push(Organization {
                                identifier: attr_value(&e, b"identifier").unwrap_or_default(),
                                title: String::new(),
                            });
                        }
                        b"resource" if parent_local == Some(b"resources".as_slice()) => {
                            manifest.resources.push(Resource {
                                identifier: attr_value(&e, b"identifier").unwrap_or_default(),
                                resource_type: attr_value(&e, b"type").unwrap_or_default(),
                                href: attr_value(&e, b"href").unwrap_or_default(),
                                files: Vec::new(),
                            });
                        }
                        b"file" => {
                            if let Some(resource) = current_resource.as_mut() {
                                if stack.len() == resource_depth {
                                    if let Some(href) = attr_value(&e, b"href") {
                                        resource.files.push(href);
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if capture != Capture::None {
                    capture_buf.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if capture != Capture::None {
                    capture_buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                stack.pop();

                if capture != Capture::None && stack.len() < capture_depth {
                    let trimmed = capture_buf.trim().to_string();
                    match capture {
                        Capture::Title if !capture_buf.is_empty() => manifest.title = Some(trimmed),
                        Capture::Description if !capture_buf.is_empty() => {
                            manifest.description = Some(trimmed)
                        }
                        Capture::OrgTitle => {
                            if let Some(org) = current_org.as_mut() {
                                org.title = trimmed;
                            }
                        }
                        _ => {}
                    }
                    capture = Capture::None;
                    capture_buf.clear();
                }

                if let Some(org) = current_org.take() {
                    if stack.len() + 1 == org_depth {
                        manifest.organizations.push(org);
                    } else {
                        current_org = Some(org);
                    }
                }
                if let Some(resource) = current_resource.take() {
                    if stack.len() + 1 == resource_depth {
                        manifest.resources.push(resource);
                    } else {
                        current_resource = Some(resource);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(manifest)
}
