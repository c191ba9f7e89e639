//! Canonical oil types and the tables that map free text onto them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TraceError;

/// Canonical oil categories, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OilType {
    Ans,
    BunkerC,
    Dilbit,
    Diesel,
    Gasoline,
    JetFuel,
    Other,
}

impl OilType {
    pub const ALL: [OilType; 7] = [
        OilType::Ans,
        OilType::BunkerC,
        OilType::Dilbit,
        OilType::Diesel,
        OilType::Gasoline,
        OilType::JetFuel,
        OilType::Other,
    ];

    /// In-house short code used in the attribution files.
    pub fn short_code(self) -> &'static str {
        match self {
            OilType::Ans => "akns",
            OilType::BunkerC => "bunker",
            OilType::Dilbit => "dilbit",
            OilType::Diesel => "diesel",
            OilType::Gasoline => "gas",
            OilType::JetFuel => "jet",
            OilType::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OilType::Ans => "ANS",
            OilType::BunkerC => "Bunker-C",
            OilType::Dilbit => "Dilbit",
            OilType::Diesel => "Diesel",
            OilType::Gasoline => "Gasoline",
            OilType::JetFuel => "Jet Fuel",
            OilType::Other => "Other",
        }
    }

    /// Particle-tracking input file naming this oil.
    pub fn lagrangian_template(self) -> &'static str {
        match self {
            OilType::Ans => "Lagrangian_akns.dat",
            OilType::BunkerC => "Lagrangian_bunker.dat",
            OilType::Dilbit => "Lagrangian_dilbit.dat",
            OilType::Diesel => "Lagrangian_diesel.dat",
            OilType::Gasoline => "Lagrangian_gas.dat",
            OilType::JetFuel => "Lagrangian_jet.dat",
            OilType::Other => "Lagrangian_other.dat",
        }
    }

    /// The four-way grouping used by the fate model's physical oil
    /// properties: gasoline and jet fuel run as diesel, other as bunker.
    pub fn modelled_group(self) -> OilType {
        match self {
            OilType::Gasoline | OilType::JetFuel => OilType::Diesel,
            OilType::Other => OilType::BunkerC,
            same => same,
        }
    }

    pub fn from_short_code(code: &str) -> Option<OilType> {
        Self::ALL.into_iter().find(|o| o.short_code() == code)
    }

    pub fn from_label(label: &str) -> Option<OilType> {
        Self::ALL.into_iter().find(|o| o.label() == label)
    }

    /// Accepts a bare file name or any path ending in one.
    pub fn from_lagrangian_template(template: &str) -> Option<OilType> {
        let name = template
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(template)
            .trim();
        Self::ALL.into_iter().find(|o| o.lagrangian_template() == name)
    }
}

impl fmt::Display for OilType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Short code, presentation label, or Lagrangian template name.
impl FromStr for OilType {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        OilType::from_short_code(key)
            .or_else(|| OilType::from_label(key))
            .or_else(|| OilType::from_lagrangian_template(key))
            .ok_or_else(|| TraceError::InvalidArgument(format!("Unknown oil type: '{s}'")))
    }
}

/// One step of the product-name rule chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationRule {
    pub keyword: &'static str,
    pub oil: OilType,
}

/// Substring rules tested in order; the first hit wins.
pub const CLASSIFICATION_RULES: [ClassificationRule; 7] = [
    ClassificationRule { keyword: "CRUDE", oil: OilType::Ans },
    ClassificationRule { keyword: "BAKKEN", oil: OilType::Ans },
    ClassificationRule { keyword: "BUNKER", oil: OilType::BunkerC },
    ClassificationRule { keyword: "BITUMEN", oil: OilType::Dilbit },
    ClassificationRule { keyword: "DIESEL", oil: OilType::Diesel },
    ClassificationRule { keyword: "GASOLINE", oil: OilType::Gasoline },
    ClassificationRule { keyword: "JET", oil: OilType::JetFuel },
];

/// Classify with an arbitrary rule list. Anything unmatched is `Other`.
pub fn classify_with(rules: &[ClassificationRule], product: &str) -> OilType {
    rules
        .iter()
        .find(|rule| product.contains(rule.keyword))
        .map(|rule| rule.oil)
        .unwrap_or(OilType::Other)
}

/// Classify a raw transfer product name.
///
/// Matching is case-sensitive, as the transfer records are upper case.
pub fn classify_product(product: &str) -> OilType {
    classify_with(&CLASSIFICATION_RULES, product)
}

/// Presentation label for a short code (`akns` → `ANS`).
pub fn presentation_label(short_code: &str) -> Option<&'static str> {
    OilType::from_short_code(short_code).map(OilType::label)
}

/// Raw product names seen in a dataset, grouped by the type they classify to.
#[derive(Debug, Clone, Default)]
pub struct ProductClassification {
    groups: BTreeMap<OilType, Vec<String>>,
}

impl ProductClassification {
    /// Each distinct name is listed once, in first-seen order.
    pub fn from_products<'a, I>(products: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut groups: BTreeMap<OilType, Vec<String>> =
            OilType::ALL.iter().map(|o| (*o, Vec::new())).collect();
        for product in products {
            let names = groups.entry(classify_product(product)).or_default();
            if !names.iter().any(|n| n == product) {
                names.push(product.to_string());
            }
        }
        Self { groups }
    }

    pub fn products(&self, oil: OilType) -> &[String] {
        self.groups.get(&oil).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn oil_of(&self, product: &str) -> Option<OilType> {
        self.groups
            .iter()
            .find(|(_, names)| names.iter().any(|n| n == product))
            .map(|(oil, _)| *oil)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OilType, &[String])> {
        self.groups.iter().map(|(oil, names)| (*oil, names.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_first_keyword() {
        assert_eq!(classify_product("ALASKA NORTH SLOPE CRUDE"), OilType::Ans);
        assert_eq!(classify_product("BAKKEN"), OilType::Ans);
        assert_eq!(classify_product("ULTRA LOW SULFUR DIESEL"), OilType::Diesel);
        assert_eq!(classify_product("MINERAL SPIRITS"), OilType::Other);
        assert_eq!(classify_product("DILUTED BITUMEN"), OilType::Dilbit);
        assert_eq!(classify_product("BUNKER C"), OilType::BunkerC);
        assert_eq!(classify_product("JET A"), OilType::JetFuel);
        assert_eq!(classify_product("GASOLINE BLENDSTOCK"), OilType::Gasoline);
    }

    #[test]
    fn diesel_wins_over_jet() {
        assert_eq!(classify_product("JET DIESEL BLEND"), OilType::Diesel);
        assert_eq!(classify_product("CRUDE BUNKER"), OilType::Ans);
    }

    #[test]
    fn custom_rule_order_changes_outcome() {
        let rules = [
            ClassificationRule { keyword: "JET", oil: OilType::JetFuel },
            ClassificationRule { keyword: "DIESEL", oil: OilType::Diesel },
        ];
        assert_eq!(classify_with(&rules, "JET DIESEL BLEND"), OilType::JetFuel);
        assert_eq!(classify_with(&[], "DIESEL"), OilType::Other);
    }

    #[test]
    fn code_mapping_is_total() {
        for code in ["akns", "bunker", "dilbit", "diesel", "gas", "jet", "other"] {
            let oil = OilType::from_short_code(code).unwrap();
            assert_eq!(oil.short_code(), code);
            assert_eq!(OilType::from_lagrangian_template(oil.lagrangian_template()), Some(oil));
        }
        assert_eq!(presentation_label("akns"), Some("ANS"));
        assert_eq!(presentation_label("jet"), Some("Jet Fuel"));
        assert_eq!(presentation_label("gas"), Some("Gasoline"));
        assert_eq!(presentation_label("other"), Some("Other"));
        assert_eq!(presentation_label("kerosene"), None);
    }

    #[test]
    fn modelled_groups_collapse_light_products() {
        assert_eq!(OilType::Gasoline.modelled_group(), OilType::Diesel);
        assert_eq!(OilType::JetFuel.modelled_group(), OilType::Diesel);
        assert_eq!(OilType::Other.modelled_group(), OilType::BunkerC);
        assert_eq!(OilType::Dilbit.modelled_group(), OilType::Dilbit);
    }

    #[test]
    fn parses_any_naming() {
        assert_eq!("akns".parse::<OilType>().unwrap(), OilType::Ans);
        assert_eq!("Jet Fuel".parse::<OilType>().unwrap(), OilType::JetFuel);
        assert_eq!(
            "/runs/Lagrangian_bunker.dat".parse::<OilType>().unwrap(),
            OilType::BunkerC
        );
        assert!(matches!(
            "kerosene".parse::<OilType>(),
            Err(TraceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn inventory_lists_each_product_once() {
        let products = ["BAKKEN", "ANS CRUDE", "BAKKEN", "JET A", "ASPHALT"];
        let inventory = ProductClassification::from_products(products);
        assert_eq!(inventory.products(OilType::Ans), ["BAKKEN", "ANS CRUDE"]);
        assert_eq!(inventory.products(OilType::JetFuel), ["JET A"]);
        assert_eq!(inventory.products(OilType::Dilbit).len(), 0);
        assert_eq!(inventory.oil_of("ASPHALT"), Some(OilType::Other));
        assert_eq!(inventory.oil_of("WATER"), None);
    }
}
