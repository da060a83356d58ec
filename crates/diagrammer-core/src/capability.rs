//! Capability registry.
//!
//! A [`CapabilitySet`] is the complete list of symbols a diagram script may
//! reference. Sets are assembled by explicit insertion from the tables in
//! this module, so anything not listed here does not exist for a script:
//! there is no file, process, network, environment, import or introspection
//! primitive to forget to remove.
//!
//! Sets are built per request by [`build_capabilities`] and are immutable
//! afterwards.

use std::fmt;

use indexmap::IndexMap;
use log::debug;

use crate::family::{Family, UnsupportedFamily};

/// Broad grouping of a provider node, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Compute,
    Database,
    Network,
    Storage,
    Analytics,
}

impl Category {
    /// Lowercase category name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Compute => "compute",
            Category::Database => "database",
            Category::Network => "network",
            Category::Storage => "storage",
            Category::Analytics => "analytics",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider node type that scripts can instantiate, e.g. `EC2("web")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKind {
    name: &'static str,
    provider: Family,
    category: Category,
}

impl NodeKind {
    fn new(name: &'static str, provider: Family, category: Category) -> Self {
        Self {
            name,
            provider,
            category,
        }
    }

    /// Constructor name as written in scripts.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Family the node belongs to.
    pub fn provider(&self) -> Family {
        self.provider
    }

    /// Category of the node.
    pub fn category(&self) -> Category {
        self.category
    }
}

/// Pure helper functions available to every script.
///
/// The list is deliberately small: arithmetic and collection helpers only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    Range,
    Min,
    Max,
    Abs,
    Str,
}

impl Builtin {
    /// Every builtin exposed to scripts.
    pub const ALL: [Builtin; 6] = [
        Builtin::Len,
        Builtin::Range,
        Builtin::Min,
        Builtin::Max,
        Builtin::Abs,
        Builtin::Str,
    ];

    /// Name under which the builtin is visible to scripts.
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Range => "range",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
            Builtin::Str => "str",
        }
    }
}

/// A single symbol a script may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `Diagram(name, ...)` - creates the diagram the script builds.
    Diagram,
    /// `Cluster(label)` - groups nodes, usually used with `with`.
    Cluster,
    /// `Edge(label=, color=, style=)` - styled connection template.
    Edge,
    /// A provider node constructor.
    Node(NodeKind),
    /// A pure helper function.
    Builtin(Builtin),
}

use Category::*;

const AWS_NODES: &[(&str, Category)] = &[
    ("EC2", Compute),
    ("Lambda", Compute),
    ("EKS", Compute),
    ("ECS", Compute),
    ("RDS", Database),
    ("DynamoDB", Database),
    ("ElastiCache", Database),
    ("ELB", Network),
    ("APIGateway", Network),
    ("Route53", Network),
    ("CloudFront", Network),
    ("S3", Storage),
    ("SQS", Analytics),
];

const GCP_NODES: &[(&str, Category)] = &[
    ("ComputeEngine", Compute),
    ("KubernetesEngine", Compute),
    ("Functions", Compute),
    ("SQL", Database),
    ("Spanner", Database),
    ("BigQuery", Analytics),
    ("LoadBalancing", Network),
    ("Vpc", Network),
    ("DNS", Network),
    ("GCS", Storage),
];

const AZURE_NODES: &[(&str, Category)] = &[
    ("VirtualMachine", Compute),
    ("KubernetesServices", Compute),
    ("FunctionApps", Compute),
    ("SQLDatabase", Database),
    ("CosmosDb", Database),
    ("ApplicationGateway", Network),
    ("VirtualNetworks", Network),
    ("LoadBalancers", Network),
    ("BlobStorage", Storage),
];

const ONPREM_NODES: &[(&str, Category)] = &[
    ("Server", Compute),
    ("PostgreSQL", Database),
    ("MongoDB", Database),
    ("MySQL", Database),
    ("Redis", Database),
    ("Nginx", Network),
    ("HAProxy", Network),
    ("Kafka", Analytics),
];

/// The immutable set of symbols visible to one script evaluation.
///
/// # Examples
///
/// ```
/// use diagrammer_core::capability::{Capability, build_capabilities};
///
/// let caps = build_capabilities("aws").unwrap();
/// assert!(matches!(caps.get("Diagram"), Some(Capability::Diagram)));
/// assert!(caps.get("EC2").is_some());
/// assert!(caps.get("open").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CapabilitySet {
    family: Family,
    symbols: IndexMap<&'static str, Capability>,
}

impl CapabilitySet {
    /// Builds the capability set of `family`.
    ///
    /// Families whose input is not a script ([`Family::Erd`],
    /// [`Family::JsonTree`]) get an empty set.
    pub fn for_family(family: Family) -> Self {
        let mut set = Self {
            family,
            symbols: IndexMap::new(),
        };

        let nodes = match family {
            Family::Aws => AWS_NODES,
            Family::Gcp => GCP_NODES,
            Family::Azure => AZURE_NODES,
            Family::Onprem => ONPREM_NODES,
            Family::Erd | Family::JsonTree => return set,
        };

        set.insert("Diagram", Capability::Diagram);
        set.insert("Cluster", Capability::Cluster);
        set.insert("Edge", Capability::Edge);
        for builtin in Builtin::ALL {
            set.insert(builtin.name(), Capability::Builtin(builtin));
        }
        for &(name, category) in nodes {
            set.insert(name, Capability::Node(NodeKind::new(name, family, category)));
        }

        debug!(family = family.as_str(), symbols = set.len(); "Capability set built");
        set
    }

    fn insert(&mut self, name: &'static str, capability: Capability) {
        self.symbols.insert(name, capability);
    }

    /// Family this set was built for.
    pub fn family(&self) -> Family {
        self.family
    }

    /// Looks up a symbol by name.
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.symbols.get(name)
    }

    /// Returns `true` if the set defines `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Iterates over symbol names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.symbols.keys().copied()
    }

    /// Iterates over `(name, capability)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Capability)> + '_ {
        self.symbols.iter().map(|(name, cap)| (*name, cap))
    }

    /// Number of symbols in the set.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if no symbol is visible.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Builds a fresh capability set for the named family.
///
/// # Errors
///
/// Returns [`UnsupportedFamily`] if `family` is not a known family name.
pub fn build_capabilities(family: &str) -> Result<CapabilitySet, UnsupportedFamily> {
    let family: Family = family.parse()?;
    Ok(CapabilitySet::for_family(family))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const DENY_LIST: &[&str] = &[
        "open",
        "exec",
        "eval",
        "compile",
        "__import__",
        "import",
        "getattr",
        "setattr",
        "delattr",
        "type",
        "globals",
        "locals",
        "vars",
        "dir",
        "os",
        "sys",
        "subprocess",
        "socket",
        "environ",
        "input",
        "print",
        "__builtins__",
        "breakpoint",
        "memoryview",
    ];

    #[test]
    fn test_deny_list_absent_for_every_family() {
        for family in Family::ALL {
            let caps = CapabilitySet::for_family(family);
            for name in DENY_LIST {
                assert!(
                    !caps.contains(name),
                    "`{name}` must not be visible to {family} scripts"
                );
            }
        }
    }

    #[test]
    fn test_scripted_family_has_primitives() {
        let caps = build_capabilities("gcp").unwrap();
        assert_eq!(caps.family(), Family::Gcp);
        assert_eq!(caps.get("Diagram"), Some(&Capability::Diagram));
        assert_eq!(caps.get("Cluster"), Some(&Capability::Cluster));
        assert_eq!(caps.get("Edge"), Some(&Capability::Edge));
        assert_eq!(caps.get("len"), Some(&Capability::Builtin(Builtin::Len)));
    }

    #[test]
    fn test_provider_vocabulary_is_scoped() {
        let aws = build_capabilities("aws").unwrap();
        let onprem = build_capabilities("onprem").unwrap();

        match aws.get("RDS") {
            Some(Capability::Node(kind)) => {
                assert_eq!(kind.provider(), Family::Aws);
                assert_eq!(kind.category(), Category::Database);
            }
            other => panic!("Expected RDS node, got {other:?}"),
        }
        assert!(!aws.contains("Nginx"));
        assert!(onprem.contains("Nginx"));
        assert!(!onprem.contains("EC2"));
    }

    #[test]
    fn test_non_script_families_are_empty() {
        assert!(build_capabilities("erd").unwrap().is_empty());
        assert!(build_capabilities("json").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_family_fails() {
        let err = build_capabilities("kubernetes").unwrap_err();
        assert_eq!(err, UnsupportedFamily("kubernetes".to_string()));
    }

    proptest! {
        #[test]
        fn test_prop_unknown_family_strings_fail(name in "[a-zA-Z_\\-]{0,12}") {
            prop_assume!(name.parse::<Family>().is_err());
            prop_assert!(build_capabilities(&name).is_err());
        }

        #[test]
        fn test_prop_lowercase_dunder_names_never_visible(name in "__[a-z]{1,10}__") {
            for family in Family::ALL {
                prop_assert!(!CapabilitySet::for_family(family).contains(&name));
            }
        }
    }
}
