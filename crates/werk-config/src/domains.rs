//! Fully-qualified domain name derivation.
//!
//! The certificate request covers every name any component of the
//! deployment is reachable under. The order of the resulting list is part
//! of the contract: callers join it into a single backend argument and
//! some index into it, so it is never sorted or deduplicated.

/// Product that always receives a name, reserved for the identity service.
pub const RESERVED_PRODUCT: &str = "kc";

/// Split a comma separated list, trimming entries and dropping empty ones.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Build the FQDN list from comma separated subdomain and product lists.
///
/// See [`build_fqdns_from`] for the ordering.
#[must_use]
pub fn build_fqdns(domain: &str, subdomains: &str, products: &str) -> Vec<String> {
    build_fqdns_from(domain, &split_list(subdomains), &split_list(products))
}

/// Build the FQDN list.
///
/// Order: `sub.domain` for every subdomain, then for every product
/// (with [`RESERVED_PRODUCT`] appended when missing) `product.domain`
/// followed by `sub.product.domain` for every subdomain, and finally the
/// bare domain. Duplicates are kept.
#[must_use]
pub fn build_fqdns_from<S, P>(domain: &str, subdomains: &[S], products: &[P]) -> Vec<String>
where
    S: AsRef<str>,
    P: AsRef<str>,
{
    let mut products: Vec<&str> = products.iter().map(AsRef::as_ref).collect();
    if !products.contains(&RESERVED_PRODUCT) {
        products.push(RESERVED_PRODUCT);
    }

    let mut fqdns = Vec::with_capacity(subdomains.len() * (products.len() + 1) + products.len() + 1);
    for sub in subdomains {
        fqdns.push(format!("{}.{domain}", sub.as_ref()));
    }
    for product in products {
        fqdns.push(format!("{product}.{domain}"));
        for sub in subdomains {
            fqdns.push(format!("{}.{product}.{domain}", sub.as_ref()));
        }
    }
    fqdns.push(domain.to_string());
    fqdns
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use test_case::test_case;

    #[test_case("fake,mtls", &["fake", "mtls"] ; "plain")]
    #[test_case(" fake , mtls ", &["fake", "mtls"] ; "whitespace")]
    #[test_case("fake,,mtls,", &["fake", "mtls"] ; "empty entries")]
    #[test_case("", &[] ; "empty")]
    fn split_list_cases(input: &str, expected: &[&str]) {
        assert_eq!(split_list(input), expected);
    }

    #[test]
    fn example_deployment() {
        let fqdns = build_fqdns("example.com", "mtls", "fake,tak");
        assert_eq!(
            fqdns,
            vec![
                "mtls.example.com",
                "fake.example.com",
                "mtls.fake.example.com",
                "tak.example.com",
                "mtls.tak.example.com",
                "kc.example.com",
                "mtls.kc.example.com",
                "example.com",
            ]
        );
    }

    #[test]
    fn bare_domain_is_last() {
        let fqdns = build_fqdns("pytest.pvarki.fi", "fake,mtls", "");
        assert_eq!(fqdns.last().map(String::as_str), Some("pytest.pvarki.fi"));
    }

    #[test]
    fn reserved_product_not_repeated() {
        let fqdns = build_fqdns("example.com", "", "kc,fake");
        assert_eq!(fqdns, vec!["kc.example.com", "fake.example.com", "example.com"]);
    }

    #[test]
    fn duplicates_are_kept() {
        // "fake" is both a subdomain and a product
        let fqdns = build_fqdns("example.com", "fake", "fake");
        let count = fqdns.iter().filter(|d| *d == "fake.example.com").count();
        assert_eq!(count, 2);
    }

    fn label() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,8}"
    }

    proptest! {
        #[test]
        fn contains_every_expected_name(
            domain in "[a-z]{1,10}\\.[a-z]{2,4}",
            subdomains in proptest::collection::vec(label(), 0..4),
            products in proptest::collection::vec(label(), 0..4),
        ) {
            let fqdns: HashSet<String> =
                build_fqdns(&domain, &subdomains.join(","), &products.join(","))
                    .into_iter()
                    .collect();

            prop_assert!(fqdns.contains(&domain));
            let reserved = format!("{RESERVED_PRODUCT}.{domain}");
            prop_assert!(fqdns.contains(&reserved));
            for sub in &subdomains {
                let top = format!("{sub}.{domain}");
                prop_assert!(fqdns.contains(&top));
                for product in &products {
                    let nested = format!("{sub}.{product}.{domain}");
                    prop_assert!(fqdns.contains(&nested));
                }
            }
            for product in &products {
                let name = format!("{product}.{domain}");
                prop_assert!(fqdns.contains(&name));
            }
        }
    }
}
