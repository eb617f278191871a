//! Value and metadata types shared by all drivers.

/// Identification fields reported by a live connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseMetadata {
    pub driver_name: String,
    pub driver_version: String,
    pub protocol_major_version: u32,
    pub protocol_minor_version: u32,
    pub database_product_name: String,
    pub database_product_version: String,
}

impl DatabaseMetadata {
    /// Returns the protocol version as `major.minor`.
    pub fn protocol_version(&self) -> String {
        format!(
            "{}.{}",
            self.protocol_major_version, self.protocol_minor_version
        )
    }
}

/// Generic SQL type categories, numbered after the X/Open SQL type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Null,
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Char,
    Varchar,
    Date,
    Time,
    Timestamp,
    Binary,
    Other,
}

impl SqlType {
    /// Returns the numeric type code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Boolean => 16,
            Self::SmallInt => 5,
            Self::Integer => 4,
            Self::BigInt => -5,
            Self::Real => 7,
            Self::Double => 8,
            Self::Numeric => 2,
            Self::Char => 1,
            Self::Varchar => 12,
            Self::Date => 91,
            Self::Time => 92,
            Self::Timestamp => 93,
            Self::Binary => -2,
            Self::Other => 1111,
        }
    }

    /// Classifies a driver-reported type name.
    pub fn from_type_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        // Strip length/precision suffixes such as VARCHAR(255) or NUMERIC(10,2)
        let base = upper.split('(').next().unwrap_or("").trim();

        match base {
            "NULL" => Self::Null,
            "BOOL" | "BOOLEAN" => Self::Boolean,
            "INT2" | "SMALLINT" => Self::SmallInt,
            "INT" | "INT4" | "INTEGER" | "SERIAL" => Self::Integer,
            "INT8" | "BIGINT" | "BIGSERIAL" => Self::BigInt,
            "FLOAT4" | "REAL" => Self::Real,
            "FLOAT8" | "DOUBLE PRECISION" | "DOUBLE" | "FLOAT" => Self::Double,
            "NUMERIC" | "DECIMAL" => Self::Numeric,
            "CHAR" | "BPCHAR" | "CHARACTER" => Self::Char,
            "VARCHAR" | "TEXT" | "NAME" | "CHARACTER VARYING" => Self::Varchar,
            "DATE" => Self::Date,
            "TIME" | "TIMETZ" => Self::Time,
            "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" => Self::Timestamp,
            "BYTEA" | "BLOB" => Self::Binary,
            _ => Self::Other,
        }
    }

    /// Returns the name of the value type cells of this column decode into.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "bool",
            Self::SmallInt | Self::Integer | Self::BigInt => "i64",
            Self::Real | Self::Double => "f64",
            Self::Binary => "Vec<u8>",
            _ => "String",
        }
    }

    /// Returns the default display width for values of this type.
    pub fn display_size(&self) -> i32 {
        match self {
            Self::Null => 4,
            Self::Boolean => 1,
            Self::SmallInt => 6,
            Self::Integer => 11,
            Self::BigInt => 20,
            Self::Real => 15,
            Self::Double => 25,
            Self::Numeric => 131089,
            Self::Date => 13,
            Self::Time => 15,
            Self::Timestamp => 29,
            Self::Char | Self::Varchar | Self::Binary | Self::Other => i32::MAX,
        }
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub label: String,
    pub type_code: i32,
    pub type_name: String,
    pub class_name: String,
    pub display_size: i32,
    pub scale: i32,
}

impl ColumnDescriptor {
    /// Builds a descriptor from a column name and a driver-reported type name.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let name = name.into();
        let type_name = type_name.into();
        let sql_type = SqlType::from_type_name(&type_name);

        Self {
            label: name.clone(),
            name,
            type_code: sql_type.code(),
            class_name: sql_type.class_name().to_string(),
            display_size: sql_type.display_size(),
            scale: declared_scale(&type_name),
            type_name,
        }
    }
}

/// Reads the scale from a `(precision, scale)` suffix such as `NUMERIC(10,2)`.
fn declared_scale(type_name: &str) -> i32 {
    type_name
        .split_once('(')
        .and_then(|(_, args)| args.split_once(')'))
        .and_then(|(args, _)| args.split_once(','))
        .and_then(|(_, scale)| scale.trim().parse().ok())
        .unwrap_or(0)
}

/// A row of data from a cursor.
pub type Row = Vec<Value>;

/// Represents a single value read from a cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the string form of the value; NULL renders as `null`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
