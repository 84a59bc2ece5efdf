//! Static plan catalog: provider price ids mapped to credit grants.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub price_id: String,
    pub plan_type: String,
    pub credits: i64,
}

/// Price-id lookup table built from configuration. Unknown price ids
/// resolve to zero credits and an `Unknown` plan type so the reconciler
/// records the subscription without granting anything.
#[derive(Debug, Clone, Serialize)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self { plans }
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn find(&self, price_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.price_id == price_id)
    }

    pub fn credits_for(&self, price_id: &str) -> i64 {
        self.find(price_id).map(|p| p.credits).unwrap_or(0)
    }

    pub fn plan_type_for(&self, price_id: &str) -> String {
        self.find(price_id)
            .map(|p| p.plan_type.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn is_known_price(&self, price_id: &str) -> bool {
        self.find(price_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PlanCatalog {
        PlanCatalog::new(vec![
            Plan {
                price_id: "price_basic".into(),
                plan_type: "Básico".into(),
                credits: 100,
            },
            Plan {
                price_id: "price_pro".into(),
                plan_type: "Profesional".into(),
                credits: 300,
            },
            Plan {
                price_id: "price_ent".into(),
                plan_type: "Empresarial".into(),
                credits: 1000,
            },
        ])
    }

    #[test]
    fn known_price_resolves_credits_and_type() {
        let c = catalog();
        assert_eq!(c.credits_for("price_pro"), 300);
        assert_eq!(c.plan_type_for("price_ent"), "Empresarial");
        assert!(c.is_known_price("price_basic"));
    }

    #[test]
    fn unknown_price_grants_nothing() {
        let c = catalog();
        assert_eq!(c.credits_for("price_nope"), 0);
        assert_eq!(c.plan_type_for("price_nope"), "Unknown");
        assert!(!c.is_known_price("price_nope"));
    }
}
