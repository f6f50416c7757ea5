//! Self-describing hierarchical binary container.
//!
//! A file is a tree of named groups and datasets, each carrying typed
//! attributes. Datasets hold a dense n-dimensional array of one [`Dtype`].
//!
//! ```text
//! file    := MAGIC version:u16 node(root group)
//! node    := tag:u8 name attrs (group-body | dataset-body)
//! attrs   := count:u32 (name type:u8 value)*
//! group   := count:u32 node*
//! dataset := dtype:u8 rank:u32 dim:u64* len:u64 payload
//! name    := len:u32 utf8
//! ```
//!
//! All integers and floats are little-endian, including dataset payloads.

use std::borrow::Cow;
use std::io::{self, Write};

use basicshapes_core::Dtype;
use thiserror::Error;

/// File signature.
pub const MAGIC: [u8; 4] = *b"BSHP";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Maximum group nesting accepted by the decoder.
pub const MAX_DEPTH: usize = 32;

const TAG_GROUP: u8 = 1;
const TAG_DATASET: u8 = 2;

const ATTR_INT: u8 = 1;
const ATTR_FLOAT: u8 = 2;
const ATTR_TEXT: u8 = 3;
const ATTR_INT_ARRAY: u8 = 4;
const ATTR_FLOAT_ARRAY: u8 = 5;

/// Reasons a byte stream is not a valid container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("not a basicshapes container (bad magic)")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("unexpected end of data at byte {offset} (wanted {wanted} more bytes)")]
    Truncated { offset: usize, wanted: usize },

    #[error("unknown {what} tag {tag} at byte {offset}")]
    UnknownTag {
        what: &'static str,
        tag: u8,
        offset: usize,
    },

    #[error("invalid UTF-8 in name or text at byte {0}")]
    InvalidUtf8(usize),

    #[error("dataset '{name}' declares {expected} payload bytes but stores {actual}")]
    PayloadMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("groups nested deeper than {MAX_DEPTH}")]
    TooDeep,

    #[error("root node must be a group")]
    RootNotGroup,

    #[error("{0} trailing bytes after root group")]
    TrailingBytes(usize),
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl AttrValue {
    /// Human readable type name, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Text(_) => "text",
            AttrValue::IntArray(_) => "int array",
            AttrValue::FloatArray(_) => "float array",
        }
    }
}

/// Ordered list of named attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttrValue)>,
}

impl Attributes {
    /// Sets an attribute, replacing any previous value with the same name.
    pub fn set(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Looks up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterates attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A dense n-dimensional array with attributes.
///
/// The payload borrows from the values being written or from the decoded
/// input buffer whenever the host byte order allows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<'a> {
    pub name: String,
    pub attrs: Attributes,
    pub dtype: Dtype,
    pub dims: Vec<u64>,
    /// Little-endian element bytes.
    pub payload: Cow<'a, [u8]>,
}

impl<'a> Dataset<'a> {
    /// Creates a dataset viewing `values` as little-endian bytes. Only
    /// big-endian hosts need an owned, byte-swapped copy.
    pub fn from_values<T: basicshapes_core::Voxel>(
        name: impl Into<String>,
        dims: Vec<u64>,
        values: &'a [T],
    ) -> Self {
        let bytes: &'a [u8] = bytemuck::cast_slice(values);
        let payload = if cfg!(target_endian = "big") {
            let mut owned = bytes.to_vec();
            to_little_endian(&mut owned, T::DTYPE.size());
            Cow::Owned(owned)
        } else {
            Cow::Borrowed(bytes)
        };
        Self {
            name: name.into(),
            attrs: Attributes::default(),
            dtype: T::DTYPE,
            dims,
            payload,
        }
    }

    /// Copies the payload out as `T`. Returns `None` if the dtype differs.
    pub fn values<T: basicshapes_core::Voxel>(&self) -> Option<Vec<T>> {
        let size = T::DTYPE.size();
        if self.dtype != T::DTYPE || self.payload.len() % size != 0 {
            return None;
        }
        let mut values = vec![<T as bytemuck::Zeroable>::zeroed(); self.payload.len() / size];
        let bytes = bytemuck::cast_slice_mut::<T, u8>(&mut values);
        bytes.copy_from_slice(&self.payload);
        to_little_endian(bytes, size);
        Some(values)
    }

    /// Number of elements described by `dims`, `None` on overflow.
    pub fn element_count(&self) -> Option<u64> {
        self.dims.iter().try_fold(1u64, |acc, d| acc.checked_mul(*d))
    }
}

/// Byte-swaps each element on big-endian hosts; a no-op elsewhere. Applying it
/// twice restores the input, so it serves both directions.
fn to_little_endian(bytes: &mut [u8], elem_size: usize) {
    if cfg!(target_endian = "big") && elem_size > 1 {
        for chunk in bytes.chunks_exact_mut(elem_size) {
            chunk.reverse();
        }
    }
}

/// A named node holding attributes and children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group<'a> {
    pub name: String,
    pub attrs: Attributes,
    pub children: Vec<Node<'a>>,
}

/// A child of a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<'a> {
    Group(Group<'a>),
    Dataset(Dataset<'a>),
}

impl Node<'_> {
    pub fn name(&self) -> &str {
        match self {
            Node::Group(g) => &g.name,
            Node::Dataset(d) => &d.name,
        }
    }
}

impl<'a> Group<'a> {
    /// Creates an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a child group.
    pub fn add_group(&mut self, group: Group<'a>) {
        self.children.push(Node::Group(group));
    }

    /// Appends a dataset.
    pub fn add_dataset(&mut self, dataset: Dataset<'a>) {
        self.children.push(Node::Dataset(dataset));
    }

    /// Finds a direct child group by name.
    pub fn group(&self, name: &str) -> Option<&Group<'a>> {
        self.children.iter().find_map(|c| match c {
            Node::Group(g) if g.name == name => Some(g),
            _ => None,
        })
    }

    /// Finds a direct child dataset by name.
    pub fn dataset(&self, name: &str) -> Option<&Dataset<'a>> {
        self.children.iter().find_map(|c| match c {
            Node::Dataset(d) if d.name == name => Some(d),
            _ => None,
        })
    }

    /// Child groups in insertion order.
    pub fn groups(&self) -> impl Iterator<Item = &Group<'a>> {
        self.children.iter().filter_map(|c| match c {
            Node::Group(g) => Some(g),
            Node::Dataset(_) => None,
        })
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writes `root` as a complete container.
pub fn encode<W: Write>(root: &Group<'_>, w: &mut W) -> io::Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&FORMAT_VERSION.to_le_bytes())?;
    write_group(root, w)
}

/// Encodes `root` into a byte vector.
pub fn encode_to_vec(root: &Group<'_>) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    encode(root, &mut out)?;
    Ok(out)
}

fn write_len<W: Write>(len: usize, w: &mut W) -> io::Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds u32"))?;
    w.write_all(&len.to_le_bytes())
}

fn write_str<W: Write>(s: &str, w: &mut W) -> io::Result<()> {
    write_len(s.len(), w)?;
    w.write_all(s.as_bytes())
}

fn write_attrs<W: Write>(attrs: &Attributes, w: &mut W) -> io::Result<()> {
    write_len(attrs.len(), w)?;
    for (name, value) in attrs.iter() {
        write_str(name, w)?;
        match value {
            AttrValue::Int(v) => {
                w.write_all(&[ATTR_INT])?;
                w.write_all(&v.to_le_bytes())?;
            }
            AttrValue::Float(v) => {
                w.write_all(&[ATTR_FLOAT])?;
                w.write_all(&v.to_le_bytes())?;
            }
            AttrValue::Text(s) => {
                w.write_all(&[ATTR_TEXT])?;
                write_str(s, w)?;
            }
            AttrValue::IntArray(values) => {
                w.write_all(&[ATTR_INT_ARRAY])?;
                write_len(values.len(), w)?;
                for v in values {
                    w.write_all(&v.to_le_bytes())?;
                }
            }
            AttrValue::FloatArray(values) => {
                w.write_all(&[ATTR_FLOAT_ARRAY])?;
                write_len(values.len(), w)?;
                for v in values {
                    w.write_all(&v.to_le_bytes())?;
                }
            }
        }
    }
    Ok(())
}

fn write_group<W: Write>(group: &Group<'_>, w: &mut W) -> io::Result<()> {
    w.write_all(&[TAG_GROUP])?;
    write_str(&group.name, w)?;
    write_attrs(&group.attrs, w)?;
    write_len(group.children.len(), w)?;
    for child in &group.children {
        match child {
            Node::Group(g) => write_group(g, w)?,
            Node::Dataset(d) => write_dataset(d, w)?,
        }
    }
    Ok(())
}

fn write_dataset<W: Write>(dataset: &Dataset<'_>, w: &mut W) -> io::Result<()> {
    w.write_all(&[TAG_DATASET])?;
    write_str(&dataset.name, w)?;
    write_attrs(&dataset.attrs, w)?;
    w.write_all(&[dataset.dtype.tag()])?;
    write_len(dataset.dims.len(), w)?;
    for d in &dataset.dims {
        w.write_all(&d.to_le_bytes())?;
    }
    w.write_all(&(dataset.payload.len() as u64).to_le_bytes())?;
    w.write_all(&dataset.payload)
}

// =============================================================================
// DECODING
// =============================================================================

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ContainerError> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(ContainerError::Truncated {
                offset: self.pos,
                wanted: n - remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ContainerError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ContainerError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ContainerError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn len(&mut self) -> Result<usize, ContainerError> {
        Ok(u32::from_le_bytes(self.array()?) as usize)
    }

    fn u64(&mut self) -> Result<u64, ContainerError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, ContainerError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, ContainerError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String, ContainerError> {
        let len = self.len()?;
        let start = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ContainerError::InvalidUtf8(start))
    }

    fn attrs(&mut self) -> Result<Attributes, ContainerError> {
        let count = self.len()?;
        let mut attrs = Attributes::default();
        for _ in 0..count {
            let name = self.string()?;
            let offset = self.pos;
            let value = match self.u8()? {
                ATTR_INT => AttrValue::Int(self.i64()?),
                ATTR_FLOAT => AttrValue::Float(self.f64()?),
                ATTR_TEXT => AttrValue::Text(self.string()?),
                ATTR_INT_ARRAY => {
                    let n = self.len()?;
                    let mut values = Vec::new();
                    for _ in 0..n {
                        values.push(self.i64()?);
                    }
                    AttrValue::IntArray(values)
                }
                ATTR_FLOAT_ARRAY => {
                    let n = self.len()?;
                    let mut values = Vec::new();
                    for _ in 0..n {
                        values.push(self.f64()?);
                    }
                    AttrValue::FloatArray(values)
                }
                tag => {
                    return Err(ContainerError::UnknownTag {
                        what: "attribute",
                        tag,
                        offset,
                    })
                }
            };
            attrs.set(name, value);
        }
        Ok(attrs)
    }

    fn node(&mut self, depth: usize) -> Result<Node<'a>, ContainerError> {
        if depth > MAX_DEPTH {
            return Err(ContainerError::TooDeep);
        }
        let offset = self.pos;
        match self.u8()? {
            TAG_GROUP => {
                let name = self.string()?;
                let attrs = self.attrs()?;
                let count = self.len()?;
                let mut children = Vec::new();
                for _ in 0..count {
                    children.push(self.node(depth + 1)?);
                }
                Ok(Node::Group(Group {
                    name,
                    attrs,
                    children,
                }))
            }
            TAG_DATASET => self.dataset().map(Node::Dataset),
            tag => Err(ContainerError::UnknownTag {
                what: "node",
                tag,
                offset,
            }),
        }
    }

    fn dataset(&mut self) -> Result<Dataset<'a>, ContainerError> {
        let name = self.string()?;
        let attrs = self.attrs()?;
        let offset = self.pos;
        let tag = self.u8()?;
        let dtype = Dtype::from_tag(tag).ok_or(ContainerError::UnknownTag {
            what: "dtype",
            tag,
            offset,
        })?;
        let rank = self.len()?;
        let mut dims = Vec::new();
        for _ in 0..rank {
            dims.push(self.u64()?);
        }
        let stored = self.u64()?;
        let expected = dims
            .iter()
            .try_fold(dtype.size() as u64, |acc, d| acc.checked_mul(*d));
        if expected != Some(stored) {
            return Err(ContainerError::PayloadMismatch {
                name,
                expected: expected.unwrap_or(u64::MAX),
                actual: stored,
            });
        }
        let len = usize::try_from(stored).map_err(|_| ContainerError::Truncated {
            offset: self.pos,
            wanted: usize::MAX,
        })?;
        let payload = Cow::Borrowed(self.take(len)?);
        Ok(Dataset {
            name,
            attrs,
            dtype,
            dims,
            payload,
        })
    }
}

/// Parses a complete container. Dataset payloads borrow from `bytes`.
pub fn decode(bytes: &[u8]) -> Result<Group<'_>, ContainerError> {
    let mut r = Reader { buf: bytes, pos: 0 };
    if r.take(MAGIC.len()).map_err(|_| ContainerError::BadMagic)? != &MAGIC[..] {
        return Err(ContainerError::BadMagic);
    }
    let version = r.u16()?;
    if version != FORMAT_VERSION {
        return Err(ContainerError::UnsupportedVersion(version));
    }
    let root = match r.node(0)? {
        Node::Group(g) => g,
        Node::Dataset(_) => return Err(ContainerError::RootNotGroup),
    };
    let trailing = bytes.len() - r.pos;
    if trailing > 0 {
        return Err(ContainerError::TrailingBytes(trailing));
    }
    Ok(root)
}
