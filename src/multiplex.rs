//! Cartesian expansion of normalized options.
//!
//! Every list-valued field multiplies the number of variants. The product is
//! enumerated by mixed-radix counting: the combination index is written in a
//! number system whose digit `i` has base `len(field_i)`, with the *last*
//! field as the least significant digit. That yields the same order as a
//! nested loop over the fields in declaration order, without recursion.
//!
//! ```text
//! width: [100, 200], format: [webp, png]
//!   index 0 → (0, 0) → width 100, webp
//!   index 1 → (0, 1) → width 100, png
//!   index 2 → (1, 0) → width 200, webp
//!   index 3 → (1, 1) → width 200, png
//! ```

use crate::options::{ImageOptions, NormalizedOptions, OptionKey, Scalar};
use std::collections::BTreeMap;

/// Expand `options` into one record per combination.
///
/// An empty input yields exactly one empty record, so every requested output
/// produces at least one variant.
pub fn multiplex(options: &NormalizedOptions) -> Vec<ImageOptions> {
    let fields: Vec<(OptionKey, &[Scalar])> = options.iter().collect();
    let total: usize = fields.iter().map(|(_, values)| values.len()).product();

    let mut digits = vec![0usize; fields.len()];
    let mut out = Vec::with_capacity(total);

    for _ in 0..total {
        let values: BTreeMap<OptionKey, Scalar> = fields
            .iter()
            .zip(&digits)
            .map(|((key, values), &d)| (*key, values[d].clone()))
            .collect();
        out.push(ImageOptions {
            values,
            preset: None,
        });

        // Increment from the least significant (last) field.
        for (digit, (_, values)) in digits.iter_mut().zip(&fields).rev() {
            *digit += 1;
            if *digit < values.len() {
                break;
            }
            *digit = 0;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn n(values: &[f64]) -> Vec<Scalar> {
        values.iter().map(|&v| Scalar::Number(v)).collect()
    }

    fn s(values: &[&str]) -> Vec<Scalar> {
        values.iter().map(|&v| Scalar::from(v)).collect()
    }

    #[test]
    fn empty_options_yield_single_empty_record() {
        let out = multiplex(&NormalizedOptions::default());
        assert_eq!(out, vec![ImageOptions::default()]);
    }

    #[test]
    fn single_field_preserves_order() {
        let opts = NormalizedOptions::from_lists([(OptionKey::Width, n(&[300.0, 100.0, 200.0]))]);
        let widths: Vec<f64> = multiplex(&opts)
            .iter()
            .map(|o| o.number(OptionKey::Width).unwrap())
            .collect();
        assert_eq!(widths, vec![300.0, 100.0, 200.0]);
    }

    #[test]
    fn width_list_with_scalar_format() {
        let opts = NormalizedOptions::from_lists([
            (OptionKey::Width, n(&[100.0, 200.0])),
            (OptionKey::Format, s(&["webp"])),
        ]);
        let out = multiplex(&opts);
        assert_eq!(
            out,
            vec![
                ImageOptions::default()
                    .with(OptionKey::Width, 100.0)
                    .with(OptionKey::Format, "webp"),
                ImageOptions::default()
                    .with(OptionKey::Width, 200.0)
                    .with(OptionKey::Format, "webp"),
            ]
        );
    }

    #[test]
    fn product_size_and_uniqueness() {
        let opts = NormalizedOptions::from_lists([
            (OptionKey::Scale, n(&[1.0, 2.0])),
            (OptionKey::Width, n(&[100.0, 200.0, 300.0])),
            (OptionKey::Format, s(&["webp", "png"])),
            (OptionKey::Inline, vec![Scalar::Bool(false)]),
        ]);
        let out = multiplex(&opts);
        assert_eq!(out.len(), 2 * 3 * 2);

        let unique: HashSet<String> = out
            .iter()
            .map(|o| serde_json::to_string(o).unwrap())
            .collect();
        assert_eq!(unique.len(), out.len());
    }

    #[test]
    fn nested_loop_order() {
        let opts = NormalizedOptions::from_lists([
            (OptionKey::Width, n(&[100.0, 200.0])),
            (OptionKey::Format, s(&["webp", "png"])),
        ]);
        let pairs: Vec<(f64, String)> = multiplex(&opts)
            .iter()
            .map(|o| {
                (
                    o.number(OptionKey::Width).unwrap(),
                    o.text(OptionKey::Format).unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                (100.0, "webp".to_string()),
                (100.0, "png".to_string()),
                (200.0, "webp".to_string()),
                (200.0, "png".to_string()),
            ]
        );
    }

    #[test]
    fn field_order_follows_declaration_not_insertion() {
        // Format is inserted first but width is declared first.
        let opts = NormalizedOptions::from_lists([
            (OptionKey::Format, s(&["webp", "png"])),
            (OptionKey::Width, n(&[100.0, 200.0])),
        ]);
        let first_two: Vec<f64> = multiplex(&opts)
            .iter()
            .take(2)
            .map(|o| o.number(OptionKey::Width).unwrap())
            .collect();
        assert_eq!(first_two, vec![100.0, 100.0]);
    }
}
