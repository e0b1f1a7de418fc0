//! Registry of per-council rule sets
//!
//! Adding a council means registering one more [`RuleSet`] here; the
//! normalizer itself never branches on council names.

use crate::extract::LabelPattern;
use crate::rules::{label, prop, renamed, same, BaySource, RuleSet, Source};
use once_cell::sync::Lazy;

/// Identifier of the fallback rule set
pub const DEFAULT_RULE_SET: &str = "Default";

static BUILTIN: Lazy<CouncilRegistry> = Lazy::new(CouncilRegistry::with_builtin_councils);

/// Council identifier → rule set, with a single default entry
#[derive(Debug, Clone)]
pub struct CouncilRegistry {
    councils: Vec<RuleSet>,
    default: RuleSet,
}

impl CouncilRegistry {
    /// Shared registry of the councils the pipeline knows about
    pub fn builtin() -> &'static CouncilRegistry {
        &BUILTIN
    }

    /// Empty registry resolving everything to `default`
    pub fn new(default: RuleSet) -> Self {
        Self {
            councils: Vec::new(),
            default,
        }
    }

    pub fn register(&mut self, rules: RuleSet) {
        self.councils.push(rules);
    }

    /// Rule set for `council`, or the default when none matches
    pub fn lookup(&self, council: &str) -> &RuleSet {
        self.councils
            .iter()
            .find(|rules| rules.matches(council))
            .unwrap_or(&self.default)
    }

    /// Identifiers of the registered (non-default) councils
    pub fn council_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.councils.iter().map(|rules| rules.id)
    }

    fn with_builtin_councils() -> Self {
        let mut registry = Self::new(default_rules());
        registry.register(camden());
        registry.register(warwickshire());
        registry.register(edinburgh());
        registry.register(manchester());
        registry.register(rkbc());
        registry
    }
}

fn camden() -> RuleSet {
    let mut rules = RuleSet::new("Camden");
    rules.name = vec![prop("controlled_parking_zone_name"), prop("sub_zone_name")];
    rules.zone_type = vec![Source::Literal("Controlled Parking Zone")];
    rules.address = vec![prop("sub_zone_name")];
    rules.hours = vec![prop("control_monday_to_friday")];
    rules.hours_monday_friday = Some(vec![prop("control_monday_to_friday")]);
    rules.hours_saturday = Some(vec![prop("control_saturday")]);
    rules.hours_sunday = Some(vec![prop("control_sunday")]);
    rules.extensions = vec![
        renamed("zone_code", "controlled_parking_zone_code"),
        renamed("zone_name", "controlled_parking_zone_name"),
        same("sub_zone_name"),
        same("identifier"),
    ];
    rules
}

fn warwickshire() -> RuleSet {
    let mut rules = RuleSet::new("Warwickshire");
    rules.name = vec![prop("street_name")];
    rules.zone_type = vec![prop("order_type"), prop("restriction")];
    rules.address = vec![prop("street_name")];
    rules.restriction = vec![prop("restriction")];
    rules.extensions = [
        "restriction_group",
        "street_name",
        "side_of_road",
        "locality",
        "district",
        "location",
        "order_type",
        "order_reference",
        "date_from",
        "date_to",
        "schedule",
    ]
    .into_iter()
    .map(same)
    .collect();
    rules
}

fn edinburgh() -> RuleSet {
    let mut rules = RuleSet::new("Edinburgh");
    rules.name = vec![Source::PrefixedProperty {
        prefix: "Zone ",
        key: "Zone_No",
    }];
    rules.zone_type = vec![prop("Bay_Type")];
    rules.extensions = vec![renamed("zone_number", "Zone_No"), renamed("bay_type", "Bay_Type")];
    rules
}

fn manchester() -> RuleSet {
    let mut rules = RuleSet::new("Manchester");
    rules.name = vec![prop("Name"), label("Name")];
    rules.zone_type = vec![prop("Type"), label("Type")];
    rules.address = vec![prop("Address"), label("Address")];
    rules.hours = vec![prop("Opening_hours"), label("Opening hours")];
    rules.bays = vec![BaySource::NamePattern];
    rules.extensions = vec![
        renamed("location", "Location"),
        renamed("contact", "Contact"),
        renamed("run_by", "Run_by"),
    ];
    rules
}

fn rkbc() -> RuleSet {
    let mut rules = RuleSet::new("RKBC");
    rules.aliases = vec!["Royal Borough of Kensington and Chelsea"];
    rules.name = vec![prop("Street_Name"), prop("Name"), label("Name")];
    rules.name_placeholders = vec!["Parking Bay on:", "Parking Bay on"];
    rules.placeholder_fallback = vec![prop("Street_Name"), Source::LeadingParagraph];
    rules.zone_type = vec![prop("Type_of_Bay"), prop("Type"), label("Type")];
    rules.address = vec![prop("Street_Name"), prop("Address"), label("Address")];
    rules.hours = vec![prop("Hours_of_Operation"), label("Opening hours"), label("Hours")];
    rules.restriction = vec![prop("Restriction"), label("Restriction")];
    rules.tariff = vec![prop("Tariff"), label("Tariff")];
    rules.bays = vec![
        BaySource::Property("No_of_Bays"),
        BaySource::Label(LabelPattern::new("No_of_Bays")),
    ];
    rules.extensions = vec![
        renamed("street_name", "Street_Name"),
        renamed("mode_of_payment", "Mode_of_Payment"),
        renamed("date_effective_from", "Date_Effective_From"),
        renamed("car_club_operator", "Car_Club_Operator"),
        renamed("ref", "Ref"),
    ];
    rules
}

fn default_rules() -> RuleSet {
    let mut rules = RuleSet::new(DEFAULT_RULE_SET);
    rules.name = vec![prop("Name"), label("Name")];
    rules.zone_type = vec![prop("Type"), prop("Type_of_Bay"), label("Type")];
    rules.address = vec![prop("Address"), prop("Street_Name"), label("Address")];
    rules.hours = vec![prop("Hours_of_Operation"), label("Opening hours"), label("Hours")];
    rules.restriction = vec![prop("Restriction"), label("Restriction")];
    rules.tariff = vec![prop("Tariff"), label("Tariff")];
    rules.bays = vec![
        BaySource::Property("No_of_Bays"),
        BaySource::NamePattern,
        BaySource::Label(LabelPattern::new("No_of_Bays")),
    ];
    rules
}
