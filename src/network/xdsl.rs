//! GeNIe XDSL network codec.
//!
//! Loading parses the `<cpt>` blocks (id, `<state>` list, optional
//! whitespace-separated `<parents>` text, whitespace-separated
//! `<probabilities>` text) into a [`Network`] and validates it. Saving
//! streams the original document event-for-event and rewrites only the
//! `<probabilities>` text of nodes whose array changed; every other
//! structural element, including the GeNIe `<extensions>` block, passes
//! through verbatim. Rewritten probabilities use 10 decimal places so
//! repeated fuse/write cycles do not accumulate rounding drift. A node
//! whose collapsed array equals the template's keeps the template's
//! original text, short form and all, which makes a no-op save
//! byte-identical to its input.

use std::fs;
use std::io;
use std::path::Path;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{CptResult, FormatError};
use crate::network::{Network, Node};

/// A loaded XDSL document: the raw text plus the network parsed from it.
///
/// The raw text is kept so that [`XdslDocument::save`] can reproduce the
/// template byte-for-byte outside the probability payloads.
#[derive(Debug, Clone)]
pub struct XdslDocument {
    raw: String,
    network: Network,
}

impl XdslDocument {
    /// Parses an XDSL document from text.
    ///
    /// # Errors
    /// `FormatError` for malformed XML or a network violating the
    /// structural invariants (missing states, array-length mismatch,
    /// dangling parent).
    pub fn parse(raw: impl Into<String>) -> Result<Self, FormatError> {
        let raw = raw.into();
        let network = parse_network(&raw)?;
        Ok(Self { raw, network })
    }

    /// Loads and parses an XDSL file.
    ///
    /// # Errors
    /// I/O errors reading the file, or any [`XdslDocument::parse`] error.
    pub fn load(path: impl AsRef<Path>) -> CptResult<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(Self::parse(raw)?)
    }

    /// The network parsed from this document.
    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Serializes the document with the probability arrays of `network`.
    ///
    /// Nodes whose array is unchanged from the template keep their
    /// original text untouched; nodes absent from `network` are also left
    /// verbatim.
    ///
    /// # Errors
    /// XML errors from the underlying reader/writer, or I/O errors from
    /// `out`.
    pub fn save<W: io::Write>(&self, network: &Network, out: W) -> CptResult<()> {
        let mut reader = Reader::from_str(&self.raw);
        let mut writer = Writer::new(out);
        let mut current_cpt: Option<String> = None;
        let mut replacing = false;
        loop {
            let event = reader.read_event().map_err(FormatError::Xml)?;
            match event {
                Event::Eof => break,
                Event::Start(ref e) if e.name().as_ref() == b"cpt" => {
                    current_cpt = Some(require_attr(e, "id")?);
                    writer.write_event(event).map_err(FormatError::Xml)?;
                }
                Event::End(ref e) if e.name().as_ref() == b"cpt" => {
                    current_cpt = None;
                    writer.write_event(event).map_err(FormatError::Xml)?;
                }
                Event::Start(ref e) if e.name().as_ref() == b"probabilities" => {
                    let replacement = current_cpt.as_deref().and_then(|id| {
                        let new = network.node(id)?;
                        let old = self.network.node(id)?;
                        if new.probabilities == old.probabilities {
                            None
                        } else {
                            Some(format_probabilities(&new.probabilities))
                        }
                    });
                    writer.write_event(event).map_err(FormatError::Xml)?;
                    if let Some(text) = replacement {
                        writer
                            .write_event(Event::Text(BytesText::new(&text)))
                            .map_err(FormatError::Xml)?;
                        replacing = true;
                    }
                }
                Event::End(ref e) if e.name().as_ref() == b"probabilities" => {
                    replacing = false;
                    writer.write_event(event).map_err(FormatError::Xml)?;
                }
                Event::Text(_) if replacing => {}
                other => writer.write_event(other).map_err(FormatError::Xml)?,
            }
        }
        Ok(())
    }

    /// [`XdslDocument::save`] to a file path.
    ///
    /// # Errors
    /// As [`XdslDocument::save`], plus file-creation errors.
    pub fn save_to_path(&self, network: &Network, path: impl AsRef<Path>) -> CptResult<()> {
        let file = fs::File::create(path)?;
        self.save(network, io::BufWriter::new(file))
    }
}

/// Fixed 10-decimal formatting, matching the template convention.
fn format_probabilities(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.10}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn require_attr(e: &BytesStart<'_>, name: &str) -> Result<String, FormatError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(attr
                .unescape_value()
                .map_err(FormatError::Xml)?
                .into_owned());
        }
    }
    Err(FormatError::MissingAttribute {
        element: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attribute: name.to_string(),
    })
}

#[derive(Clone, Copy, PartialEq)]
enum TextTarget {
    Parents,
    Probabilities,
}

fn parse_network(raw: &str) -> Result<Network, FormatError> {
    let mut reader = Reader::from_str(raw);
    let mut network = Network::new();
    let mut current: Option<Node> = None;
    let mut target: Option<TextTarget> = None;
    let mut pending = String::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"cpt" => {
                    let id = require_attr(&e, "id")?;
                    current = Some(Node::root(id, Vec::new(), Vec::new()));
                }
                b"state" => {
                    if let Some(node) = current.as_mut() {
                        node.states.push(require_attr(&e, "id")?);
                    }
                }
                b"parents" if current.is_some() => {
                    target = Some(TextTarget::Parents);
                    pending.clear();
                }
                b"probabilities" if current.is_some() => {
                    target = Some(TextTarget::Probabilities);
                    pending.clear();
                }
                _ => {}
            },
            Event::Empty(e) => {
                if e.name().as_ref() == b"state" {
                    if let Some(node) = current.as_mut() {
                        node.states.push(require_attr(&e, "id")?);
                    }
                }
            }
            Event::Text(t) => {
                if target.is_some() {
                    pending.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"parents" => {
                    if let (Some(node), Some(TextTarget::Parents)) = (current.as_mut(), target) {
                        node.parents = pending.split_whitespace().map(str::to_string).collect();
                    }
                    target = None;
                }
                b"probabilities" => {
                    if let (Some(node), Some(TextTarget::Probabilities)) =
                        (current.as_mut(), target)
                    {
                        node.probabilities = parse_probabilities(&node.id, &pending)?;
                    }
                    target = None;
                }
                b"cpt" => {
                    if let Some(node) = current.take() {
                        network.insert(node)?;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    network.validate()?;
    Ok(network)
}

fn parse_probabilities(node: &str, text: &str) -> Result<Vec<f64>, FormatError> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| FormatError::InvalidProbability {
                    node: node.to_string(),
                    value: token.to_string(),
                })
        })
        .collect()
}
