//! Shared API type definitions
//!
//! This crate contains the record types returned by the storage array's management
//! API: the cluster identity used to gate every scrape, the closed set of object
//! types a collector may fetch, and one record type per object type.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// The closed set of object classes the exporter fetches from the array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Node,
    Aggregate,
    Svm,
    Volume,
    Lun,
    Snapshot,
    Disk,
    /// Rows of one performance counter table, e.g. `volume` or `system:node`
    PerfRows(String),
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::Node => write!(f, "node"),
            ObjectType::Aggregate => write!(f, "aggregate"),
            ObjectType::Svm => write!(f, "svm"),
            ObjectType::Volume => write!(f, "volume"),
            ObjectType::Lun => write!(f, "lun"),
            ObjectType::Snapshot => write!(f, "snapshot"),
            ObjectType::Disk => write!(f, "disk"),
            ObjectType::PerfRows(table) => write!(f, "perf:{table}"),
        }
    }
}

/// Field selection sent along with a collection request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectQuery {
    /// Dotted field paths to return, e.g. `space.size`
    pub fields: Vec<String>,
}

impl ObjectQuery {
    pub fn fields(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Render the selection as the `fields` query parameter value
    pub fn to_param(&self) -> String {
        if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(",")
        }
    }
}

/// Identity of the cluster behind a management endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    /// Cluster name, used as the `cluster` label of every sample
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    /// Only reported by arrays that expose it at cluster level
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A value that the array reports either as a JSON number, a boolean or a string
///
/// Older API versions report sizes as decimal strings and states as words, newer ones
/// as plain numbers; collectors convert all of them through the state enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

/// Reference to a named object nested in another record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: String,
}

fn name_or_empty(named: &Option<NamedRef>) -> &str {
    named.as_ref().map(|n| n.name.as_str()).unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeVersion {
    #[serde(default)]
    pub full: String,
}

/// Cluster node record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub uptime: Option<RawValue>,
    #[serde(default)]
    pub state: Option<RawValue>,
    #[serde(default)]
    pub version: Option<NodeVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockStorage {
    #[serde(default)]
    pub size: Option<RawValue>,
    #[serde(default)]
    pub available: Option<RawValue>,
    #[serde(default)]
    pub used: Option<RawValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpace {
    #[serde(default)]
    pub block_storage: Option<BlockStorage>,
}

/// Aggregate record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub name: String,
    #[serde(default)]
    pub node: Option<NamedRef>,
    #[serde(default)]
    pub state: Option<RawValue>,
    #[serde(default)]
    pub space: Option<AggregateSpace>,
}

impl AggregateRecord {
    pub fn node_name(&self) -> &str {
        name_or_empty(&self.node)
    }
}

/// Storage virtual machine (vserver) record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmRecord {
    pub name: String,
    #[serde(default, alias = "subtype")]
    pub r#type: Option<String>,
    #[serde(default)]
    pub state: Option<RawValue>,
    #[serde(default)]
    pub operational_state: Option<RawValue>,
    #[serde(default, alias = "retention_period")]
    pub volume_delete_retention_hours: Option<RawValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSnapshotSpace {
    #[serde(default)]
    pub used: Option<RawValue>,
    #[serde(default)]
    pub reserve_size: Option<RawValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpace {
    #[serde(default)]
    pub size: Option<RawValue>,
    #[serde(default)]
    pub available: Option<RawValue>,
    #[serde(default, alias = "afs_total")]
    pub total: Option<RawValue>,
    #[serde(default)]
    pub used: Option<RawValue>,
    #[serde(default)]
    pub snapshot: Option<VolumeSnapshotSpace>,
}

/// Volume record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub svm: Option<NamedRef>,
    #[serde(default)]
    pub aggregates: Vec<NamedRef>,
    #[serde(default)]
    pub node: Option<NamedRef>,
    #[serde(default)]
    pub state: Option<RawValue>,
    #[serde(default)]
    pub space: Option<VolumeSpace>,
}

impl VolumeRecord {
    pub fn svm_name(&self) -> &str {
        name_or_empty(&self.svm)
    }

    /// First containing aggregate; FlexGroups span several and report the first one
    pub fn aggregate_name(&self) -> &str {
        self.aggregates
            .first()
            .map(|a| a.name.as_str())
            .unwrap_or_default()
    }

    pub fn node_name(&self) -> &str {
        name_or_empty(&self.node)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LunLocation {
    #[serde(default)]
    pub volume: Option<NamedRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LunSpace {
    #[serde(default)]
    pub size: Option<RawValue>,
    #[serde(default)]
    pub used: Option<RawValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LunStatus {
    #[serde(default)]
    pub state: Option<RawValue>,
    #[serde(default)]
    pub mapped: Option<RawValue>,
}

/// LUN record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LunRecord {
    pub name: String,
    #[serde(default)]
    pub svm: Option<NamedRef>,
    #[serde(default)]
    pub location: Option<LunLocation>,
    #[serde(default)]
    pub space: Option<LunSpace>,
    #[serde(default)]
    pub status: Option<LunStatus>,
}

impl LunRecord {
    pub fn svm_name(&self) -> &str {
        name_or_empty(&self.svm)
    }

    pub fn volume_name(&self) -> &str {
        self.location
            .as_ref()
            .map(|l| name_or_empty(&l.volume))
            .unwrap_or_default()
    }
}

/// Snapshot record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub name: String,
    #[serde(default)]
    pub volume: Option<NamedRef>,
    #[serde(default)]
    pub svm: Option<NamedRef>,
    #[serde(default)]
    pub size: Option<RawValue>,
    /// RFC 3339 creation timestamp
    #[serde(default)]
    pub create_time: Option<String>,
}

impl SnapshotRecord {
    pub fn volume_name(&self) -> &str {
        name_or_empty(&self.volume)
    }

    pub fn svm_name(&self) -> &str {
        name_or_empty(&self.svm)
    }
}

/// Physical disk record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskRecord {
    pub name: String,
    #[serde(default)]
    pub node: Option<NamedRef>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub container_type: Option<String>,
    #[serde(default)]
    pub usable_size: Option<RawValue>,
    #[serde(default)]
    pub state: Option<RawValue>,
}

impl DiskRecord {
    pub fn node_name(&self) -> &str {
        name_or_empty(&self.node)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfProperty {
    pub name: String,
    #[serde(default)]
    pub value: Option<RawValue>,
}

/// Scalar counters carry `value`; array counters carry `values` and are skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfCounter {
    pub name: String,
    #[serde(default)]
    pub value: Option<RawValue>,
}

/// One row (instance) of a performance counter table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: Vec<PerfProperty>,
    #[serde(default)]
    pub counters: Vec<PerfCounter>,
}

impl PerfRow {
    fn property(&self, name: &str) -> Option<String> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| match &p.value {
                Some(RawValue::Text(s)) => Some(s.clone()),
                Some(RawValue::Number(n)) => Some(n.to_string()),
                Some(RawValue::Bool(b)) => Some(b.to_string()),
                None => None,
            })
    }

    /// Instance name: the `name` property, falling back to the row id
    pub fn instance(&self) -> String {
        self.property("name")
            .or_else(|| self.id.clone())
            .unwrap_or_default()
    }

    pub fn node(&self) -> String {
        self.property("node.name")
            .or_else(|| self.property("node"))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn raw_value_accepts_numbers_strings_and_bools() {
        let values: Vec<RawValue> =
            serde_json::from_str(r#"[42, "online", true, "1024"]"#).expect("should parse");
        assert_eq!(
            values,
            vec![
                RawValue::Number(42.0),
                RawValue::Text("online".to_string()),
                RawValue::Bool(true),
                RawValue::Text("1024".to_string()),
            ]
        );
    }

    #[test]
    fn cluster_identity_keeps_uuid_apart_from_serial() {
        let identity: ClusterIdentity = serde_json::from_str(
            r#"{"name": "cluster1", "uuid": "8a9d0a4e-2b2f-11e9-9a3b-00a098d39e12"}"#,
        )
        .expect("should parse");
        assert_eq!(
            identity.uuid.as_deref(),
            Some("8a9d0a4e-2b2f-11e9-9a3b-00a098d39e12")
        );
        assert_eq!(identity.serial_number, None);
    }

    #[test]
    fn volume_record_tolerates_missing_sections() {
        let record: VolumeRecord =
            serde_json::from_str(r#"{"name": "vol0"}"#).expect("should parse");
        assert_eq!(record.name, "vol0");
        assert_eq!(record.svm_name(), "");
        assert_eq!(record.aggregate_name(), "");
        assert!(record.space.is_none());
    }

    #[test]
    fn volume_record_reads_afs_total_as_total() {
        let record: VolumeRecord = serde_json::from_str(
            r#"{"name": "vol1", "svm": {"name": "svm1"}, "aggregates": [{"name": "aggr1"}],
                "space": {"size": 100, "afs_total": 95, "snapshot": {"used": 3}}}"#,
        )
        .expect("should parse");
        let space = record.space.expect("space");
        assert_eq!(space.total, Some(RawValue::Number(95.0)));
        assert_eq!(record.aggregates[0].name, "aggr1");
    }

    #[test]
    fn perf_row_instance_falls_back_to_id() {
        let row: PerfRow = serde_json::from_str(
            r#"{"id": "node1:vol1", "counters": [{"name": "total_ops", "value": 10}]}"#,
        )
        .expect("should parse");
        assert_eq!(row.instance(), "node1:vol1");

        let row: PerfRow = serde_json::from_str(
            r#"{"id": "x", "properties": [{"name": "name", "value": "vol1"},
                {"name": "node.name", "value": "node1"}]}"#,
        )
        .expect("should parse");
        assert_eq!(row.instance(), "vol1");
        assert_eq!(row.node(), "node1");
    }

    #[test]
    fn object_query_renders_fields_param() {
        assert_eq!(ObjectQuery::default().to_param(), "*");
        assert_eq!(
            ObjectQuery::fields(&["name", "space.size"]).to_param(),
            "name,space.size"
        );
    }

    #[test]
    fn object_type_display() {
        assert_eq!(ObjectType::Volume.to_string(), "volume");
        assert_eq!(
            ObjectType::PerfRows("system:node".to_string()).to_string(),
            "perf:system:node"
        );
    }
}
