//! RDF vocabulary constants for the policy/composition ontology.
//!
//! All terms live under the `wd:` namespace shared by the ontology, shapes,
//! and policy graph fixtures this pipeline consumes.

pub const WD: &str = "https://paperhat.dev/ns/wd#";

macro_rules! wd_term {
    ($const_name:ident, $local:literal) => {
        pub const $const_name: &str = concat!("https://paperhat.dev/ns/wd#", $local);
    };
}

// Classes
wd_term!(COMPOSITION, "Composition");
wd_term!(VIEW, "View");
wd_term!(POLICY, "Policy");
wd_term!(ACTION, "Action");
wd_term!(STROKE, "Stroke");
wd_term!(BASELINE_GRID, "BaselineGrid");

// Policy predicates
wd_term!(APPLIES_TO, "appliesTo");
wd_term!(ENABLED, "enabled");
wd_term!(PRIORITY, "priority");
wd_term!(CONFLICT_STRATEGY, "conflictStrategy");
wd_term!(CONDITION, "condition");
wd_term!(ACTION_PRED, "action");

// Condition predicates
wd_term!(CONTEXT_KEY, "contextKey");
wd_term!(OPERATOR, "operator");
wd_term!(CONDITION_VALUE, "conditionValue");

// Action predicates
wd_term!(MODE, "mode");
wd_term!(TARGET_NODE, "targetNode");
wd_term!(TARGET_PROPERTY, "targetProperty");
wd_term!(ACTION_VALUE, "actionValue");

// Condition operators
wd_term!(OP_EQ, "OpEq");
wd_term!(OP_NE, "OpNe");
wd_term!(OP_LT, "OpLt");
wd_term!(OP_LTE, "OpLte");
wd_term!(OP_GT, "OpGt");
wd_term!(OP_GTE, "OpGte");

// Conflict strategies
wd_term!(STRATEGY_ERROR_ON_CONFLICT, "ErrorOnConflict");
wd_term!(STRATEGY_FIRST_MATCH_WINS, "FirstMatchWins");
wd_term!(STRATEGY_HIGHER_PRIORITY_WINS, "HigherPriorityWins");

// Action modes
wd_term!(MODE_REPLACE_ALL, "ReplaceAll");
wd_term!(MODE_ADD, "Add");
wd_term!(MODE_REMOVE, "Remove");

// Ownership / scoping
wd_term!(OWNED_BY, "ownedBy");

// Defaults-materialized predicates
wd_term!(STROKE_WIDTH, "strokeWidth");
wd_term!(BASELINE_STEP, "baselineStep");

// Forbidden implicit-semantics predicates
wd_term!(INHERITS_STYLE_FROM, "inheritsStyleFrom");
wd_term!(IMPLICIT_GRID_SNAP, "implicitGridSnap");
wd_term!(IMPLICIT_Z_ORDER, "implicitZOrder");
wd_term!(IMPLICIT_GROUP_DEFAULT, "implicitGroupDefault");

/// All predicates forbidden by the no-implicit-semantics procedural check.
pub const FORBIDDEN_IMPLICIT_PROPERTIES: &[&str] =
    &[INHERITS_STYLE_FROM, IMPLICIT_GRID_SNAP, IMPLICIT_Z_ORDER, IMPLICIT_GROUP_DEFAULT];

/// Hard-constraint key removed by the `allowGroupSplit` relaxation action.
pub const PRESERVE_GROUP_COHESION: &str = "preserveGroupCohesion";

/// The `gd:` namespace used for Stage A context keys derived from the
/// viewport/device profile by the intent compiler.
pub const GD: &str = "https://paperhat.dev/ns/gd#";

macro_rules! gd_term {
    ($const_name:ident, $local:literal) => {
        pub const $const_name: &str = concat!("https://paperhat.dev/ns/gd#", $local);
    };
}

gd_term!(VIEWPORT_WIDTH_PX, "ViewportWidthPx");
gd_term!(VIEWPORT_HEIGHT_PX, "ViewportHeightPx");
gd_term!(VIEWPORT_ASPECT_RATIO, "ViewportAspectRatio");
gd_term!(VIEWPORT_ORIENTATION, "ViewportOrientation");
gd_term!(DEVICE_CLASS, "DeviceClass");
gd_term!(REDUCED_MOTION_PREFERENCE, "ReducedMotionPreference");

/// XSD datatypes used to tag [`adaptive_term::Literal`] values so that a
/// condition/action value's kind can be recovered from the term alone,
/// instead of routing each kind through its own predicate.
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
