//! Identifier resolution
//!
//! [`IdentifierResolver`] turns an artifact blob into its
//! [`ArtifactIdentifier`]. [`ClassFileResolver`] handles JVM class files by
//! walking the constant pool up to the `this_class` entry; nothing after it
//! (fields, methods, attributes) is read.

use crate::blob::{ArtifactBlob, ArtifactIdentifier};

/// Class file magic number
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// Resolves the identifier carried inside an artifact
pub trait IdentifierResolver: Send + Sync {
    /// Resolve the identifier of `artifact`
    ///
    /// # Errors
    /// Returns [`IdentifierResolutionError`] if the blob is malformed
    fn resolve(&self, artifact: &ArtifactBlob) -> Result<ArtifactIdentifier, IdentifierResolutionError>;
}

impl<F> IdentifierResolver for F
where
    F: Fn(&ArtifactBlob) -> Result<ArtifactIdentifier, IdentifierResolutionError> + Send + Sync,
{
    fn resolve(&self, artifact: &ArtifactBlob) -> Result<ArtifactIdentifier, IdentifierResolutionError> {
        self(artifact)
    }
}

/// Resolver for compiled JVM class files
///
/// Returns the binary class name with `/` replaced by `.`
/// (`com/example/Greeter` → `com.example.Greeter`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassFileResolver;

impl ClassFileResolver {
    /// Create new class file resolver
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IdentifierResolver for ClassFileResolver {
    fn resolve(&self, artifact: &ArtifactBlob) -> Result<ArtifactIdentifier, IdentifierResolutionError> {
        read_class_name(artifact.as_bytes()).map(|name| ArtifactIdentifier::new(name.replace('/', ".")))
    }
}

/// Constant pool entries the resolver needs to remember
#[derive(Debug, Clone)]
enum Constant {
    Utf8(Option<String>),
    Class { name_index: u16 },
    Other,
    /// Second slot of a long/double entry
    Unusable,
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], IdentifierResolutionError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(IdentifierResolutionError::Truncated {
                offset: self.offset,
                needed: len,
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, IdentifierResolutionError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, IdentifierResolutionError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, IdentifierResolutionError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip(&mut self, len: usize) -> Result<(), IdentifierResolutionError> {
        self.take(len).map(|_| ())
    }
}

fn read_class_name(bytes: &[u8]) -> Result<String, IdentifierResolutionError> {
    if bytes.is_empty() {
        return Err(IdentifierResolutionError::Empty);
    }

    let mut reader = Reader::new(bytes);
    let magic = reader.u32()?;
    if magic != CLASS_MAGIC {
        return Err(IdentifierResolutionError::BadMagic(magic));
    }
    reader.skip(4)?; // minor + major version

    let pool = read_constant_pool(&mut reader)?;
    reader.skip(2)?; // access flags
    let this_class = reader.u16()?;

    let name_index = match pool.get(usize::from(this_class)) {
        Some(Constant::Class { name_index }) => *name_index,
        Some(_) => {
            return Err(IdentifierResolutionError::UnexpectedConstant {
                index: this_class,
                expected: "Class",
            })
        }
        None => return Err(IdentifierResolutionError::InvalidConstantIndex(this_class)),
    };

    match pool.get(usize::from(name_index)) {
        Some(Constant::Utf8(Some(name))) if !name.is_empty() => Ok(name.clone()),
        Some(Constant::Utf8(_)) => Err(IdentifierResolutionError::InvalidUtf8 { index: name_index }),
        Some(_) => Err(IdentifierResolutionError::UnexpectedConstant {
            index: name_index,
            expected: "Utf8",
        }),
        None => Err(IdentifierResolutionError::InvalidConstantIndex(name_index)),
    }
}

/// Reads the constant pool; index 0 is a placeholder so entries line up with
/// their 1-based pool indices.
fn read_constant_pool(reader: &mut Reader<'_>) -> Result<Vec<Constant>, IdentifierResolutionError> {
    let count = reader.u16()?;
    let mut pool = Vec::with_capacity(usize::from(count));
    pool.push(Constant::Unusable);

    let mut index: u16 = 1;
    while index < count {
        let tag = reader.u8()?;
        let (constant, slots) = match tag {
            1 => {
                let len = reader.u16()?;
                let raw = reader.take(usize::from(len))?;
                (Constant::Utf8(String::from_utf8(raw.to_vec()).ok()), 1)
            }
            7 => (Constant::Class { name_index: reader.u16()? }, 1),
            // Integer, Float, Fieldref, Methodref, InterfaceMethodref,
            // NameAndType, Dynamic, InvokeDynamic
            3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                reader.skip(4)?;
                (Constant::Other, 1)
            }
            // Long, Double take two pool slots
            5 | 6 => {
                reader.skip(8)?;
                (Constant::Other, 2)
            }
            // String, MethodType, Module, Package
            8 | 16 | 19 | 20 => {
                reader.skip(2)?;
                (Constant::Other, 1)
            }
            // MethodHandle
            15 => {
                reader.skip(3)?;
                (Constant::Other, 1)
            }
            _ => return Err(IdentifierResolutionError::UnknownConstantTag { index, tag }),
        };

        pool.push(constant);
        if slots == 2 {
            pool.push(Constant::Unusable);
        }
        index = index.saturating_add(slots);
    }

    Ok(pool)
}

/// Errors while resolving an identifier from an artifact
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierResolutionError {
    /// Blob has no bytes
    #[error("artifact is empty")]
    Empty,

    /// Blob ended before a field could be read
    #[error("artifact truncated at offset {offset} (needed {needed} more bytes)")]
    Truncated {
        /// Offset where reading stopped
        offset: usize,
        /// Bytes required at that offset
        needed: usize,
    },

    /// Not a class file
    #[error("bad magic number: {0:#010x}")]
    BadMagic(u32),

    /// Constant pool tag not defined by the class file format
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag {
        /// Pool index
        index: u16,
        /// Tag byte
        tag: u8,
    },

    /// Reference outside the constant pool
    #[error("constant pool index {0} out of range")]
    InvalidConstantIndex(u16),

    /// Reference to a constant of the wrong kind
    #[error("constant pool index {index} is not a {expected} entry")]
    UnexpectedConstant {
        /// Pool index
        index: u16,
        /// Kind the reference requires
        expected: &'static str,
    },

    /// Class name is not valid UTF-8
    #[error("class name at constant pool index {index} is not valid UTF-8")]
    InvalidUtf8 {
        /// Pool index
        index: u16,
    },

    /// Format-specific failure from a custom resolver
    #[error("malformed artifact: {0}")]
    Malformed(String),
}
