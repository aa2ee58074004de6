use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    None,
    Number,
    String,
    Date,
    Boolean,
    Integer,
    BigNumber,
    Serializable,
    Binary,
    Timestamp,
    InetAddress,
}

impl ValueType {
    pub const ALL: [ValueType; 11] = [
        ValueType::None,
        ValueType::Number,
        ValueType::String,
        ValueType::Date,
        ValueType::Boolean,
        ValueType::Integer,
        ValueType::BigNumber,
        ValueType::Serializable,
        ValueType::Binary,
        ValueType::Timestamp,
        ValueType::InetAddress,
    ];

    /// Stable numeric id, as used by step metadata and repository exports.
    pub const fn id(self) -> u8 {
        match self {
            ValueType::None => 0,
            ValueType::Number => 1,
            ValueType::String => 2,
            ValueType::Date => 3,
            ValueType::Boolean => 4,
            ValueType::Integer => 5,
            ValueType::BigNumber => 6,
            ValueType::Serializable => 7,
            ValueType::Binary => 8,
            ValueType::Timestamp => 9,
            ValueType::InetAddress => 10,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueType::None => "None",
            ValueType::Number => "Number",
            ValueType::String => "String",
            ValueType::Date => "Date",
            ValueType::Boolean => "Boolean",
            ValueType::Integer => "Integer",
            ValueType::BigNumber => "BigNumber",
            ValueType::Serializable => "Serializable",
            ValueType::Binary => "Binary",
            ValueType::Timestamp => "Timestamp",
            ValueType::InetAddress => "Internet Address",
        }
    }

    /// Whether `length`/`precision` carry meaning for this type.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::Number | ValueType::Integer | ValueType::BigNumber
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How field values are physically held in a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    #[default]
    Normal,
    /// Raw bytes read from a file or socket, converted lazily.
    BinaryString,
    /// Index into a dictionary of distinct values.
    Indexed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrimType {
    #[default]
    None,
    Left,
    Right,
    Both,
}

/// Descriptor of a single field: name, type, size and formatting metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueMeta {
    pub name: String,
    pub value_type: ValueType,
    /// `-1` when undefined.
    pub length: i32,
    /// `-1` when undefined.
    pub precision: i32,
    /// Name of the step that produced the field.
    pub origin: Option<String>,
    pub comments: Option<String>,
    pub conversion_mask: Option<String>,
    pub storage_type: StorageType,
    pub trim_type: TrimType,
    pub case_insensitive: bool,
    /// Database-native column type name (`VARCHAR2`, `int8`, ...).
    pub original_column_type_name: Option<String>,
    pub original_nullable: Option<bool>,
}

impl ValueMeta {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::with_length(name, value_type, -1, -1)
    }

    pub fn with_length(
        name: impl Into<String>,
        value_type: ValueType,
        length: i32,
        precision: i32,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            length,
            precision,
            origin: None,
            comments: None,
            conversion_mask: None,
            storage_type: StorageType::Normal,
            trim_type: TrimType::None,
            case_insensitive: false,
            original_column_type_name: None,
            original_nullable: None,
        }
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn conversion_mask(mut self, mask: impl Into<String>) -> Self {
        self.conversion_mask = Some(mask.into());
        self
    }

    pub fn storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = storage_type;
        self
    }

    pub fn trim_type(mut self, trim_type: TrimType) -> Self {
        self.trim_type = trim_type;
        self
    }

    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn original_column_type(mut self, type_name: impl Into<String>, nullable: bool) -> Self {
        self.original_column_type_name = Some(type_name.into());
        self.original_nullable = Some(nullable);
        self
    }
}

impl fmt::Display for ValueMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.value_type)?;
        match (self.length, self.precision) {
            (len, prec) if len >= 0 && prec >= 0 => write!(f, "({len}, {prec})"),
            (len, _) if len >= 0 => write!(f, "({len})"),
            _ => Ok(()),
        }
    }
}

/// Ordered field descriptors describing the rows produced by a database operation.
///
/// `Clone` is a deep copy: the descriptor owns its fields outright, so a clone can be mutated
/// without affecting the original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowMeta {
    values: Vec<ValueMeta>,
}

impl RowMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: ValueMeta) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ValueMeta> {
        self.values.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ValueMeta> {
        self.values.get_mut(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<ValueMeta> {
        (index < self.values.len()).then(|| self.values.remove(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValueMeta> {
        self.values.iter()
    }

    /// Position of the first field named `name`, ignoring ASCII case.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.values
            .iter()
            .position(|value| value.name.eq_ignore_ascii_case(name))
    }

    pub fn search(&self, name: &str) -> Option<&ValueMeta> {
        self.index_of(name).and_then(|index| self.values.get(index))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.values.iter().map(|value| value.name.as_str()).collect()
    }
}

impl FromIterator<ValueMeta> for RowMeta {
    fn from_iter<I: IntoIterator<Item = ValueMeta>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RowMeta {
    type Item = &'a ValueMeta;
    type IntoIter = std::slice::Iter<'a, ValueMeta>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl fmt::Display for RowMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, value) in self.values.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}
