//! Catalog summary analytics
//!
//! Derived figures over a written product CSV: category volume with English
//! names, price and discount tiers, the median price, installment terms, brand
//! and review coverage, and seller concentration.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::ProductRecord;

/// English names for the storefront's Azerbaijani category labels.
pub static CATEGORY_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Çiyin çantaları", "Shoulder Bags"),
        ("Pul kisələri, pulqabıları", "Wallets & Purses"),
        ("Qadın gün eynəkləri", "Women's Sunglasses"),
        ("Kişi krosovkaları və kedləri", "Men's Sneakers"),
        ("Kişi gün eynəkləri", "Men's Sunglasses"),
        ("Kross-bodi çantalar", "Crossbody Bags"),
        ("Qadın krosovkaları və kedləri", "Women's Sneakers"),
        ("Kişi cinsləri", "Men's Jeans"),
        ("Kişi klassik ayaqqabıları", "Men's Dress Shoes"),
        ("Kolqotqalar və uzun corablar", "Tights & Long Socks"),
        ("Çamadanlar", "Suitcases / Luggage"),
        ("Qadın şərfləri", "Women's Scarves"),
        ("Bel çantaları, portfellər, məktəb çantaları", "Backpacks & School Bags"),
        ("Qadın nazik köynəkləri", "Women's Blouses"),
        ("Saçlar üçün sancaqlar və rezin bağları", "Hair Clips & Bands"),
    ])
});

/// Price tier labels, cheapest first.
pub const PRICE_TIER_ORDER: [&str; 6] = ["Under 10", "10-25", "25-50", "50-100", "100-200", "200+"];

/// Discount tier labels, smallest first.
pub const DISCOUNT_TIER_ORDER: [&str; 5] = ["No Discount", "1-10%", "11-24%", "25-50%", "50%+"];

/// Top-N cut-offs for seller concentration.
pub const CONCENTRATION_MILESTONES: [usize; 6] = [5, 10, 15, 20, 25, 50];

/// Installment terms reported, in months. Zero means no installment plan.
pub const INSTALLMENT_TERMS: [u32; 6] = [0, 3, 6, 12, 18, 24];

/// Named brands listed in a summary.
pub const TOP_BRANDS: usize = 10;

/// Largest categories given a review breakdown.
pub const REVIEW_CATEGORIES: usize = 10;

/// Brand values that mean "unbranded".
const NO_BRAND: [&str; 4] = ["No Brand", "No brand", "", "nan"];

/// Report errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Input file could not be opened
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV row
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// English category name, or the original when untranslated.
pub fn english_category(name: &str) -> &str {
    CATEGORY_MAP.get(name).copied().unwrap_or(name)
}

/// Price tier for `price`. Bins are right-inclusive; zero or negative prices
/// fall outside every tier.
pub fn price_tier(price: f64) -> Option<&'static str> {
    const UPPER: [f64; 5] = [10.0, 25.0, 50.0, 100.0, 200.0];
    if price.is_nan() || price <= 0.0 {
        return None;
    }
    let index = UPPER
        .iter()
        .position(|upper| price <= *upper)
        .unwrap_or(UPPER.len());
    Some(PRICE_TIER_ORDER[index])
}

/// Discount tier for a percentage.
pub fn discount_tier(discount: f64) -> &'static str {
    if discount == 0.0 {
        "No Discount"
    } else if discount <= 10.0 {
        "1-10%"
    } else if discount < 25.0 {
        "11-24%"
    } else if discount <= 50.0 {
        "25-50%"
    } else {
        "50%+"
    }
}

/// Whether `brand` names a real brand.
pub fn has_brand(brand: &str) -> bool {
    !NO_BRAND.contains(&brand)
}

/// Products in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    /// English name when known
    pub name: String,
    /// Products in the category
    pub count: usize,
    /// Mean retail price of priced products
    pub avg_price: Option<f64>,
}

/// Products in one tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCount {
    /// Tier label
    pub label: &'static str,
    /// Products in the tier
    pub count: usize,
    /// Mean retail price of priced products
    pub avg_price: Option<f64>,
}

/// Products offering one installment term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallmentCount {
    /// Longest term in months
    pub months: u32,
    /// Products whose longest term is `months`
    pub count: usize,
    /// Share of products with a listed term, percent
    pub share_pct: f64,
}

impl InstallmentCount {
    /// Display label ("None", "3 mo", ...).
    pub fn label(&self) -> String {
        if self.months == 0 {
            "None".to_string()
        } else {
            format!("{} mo", self.months)
        }
    }
}

/// Products carrying one brand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandCount {
    /// Brand name
    pub name: String,
    /// Products listed under it
    pub count: usize,
}

/// Review coverage of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReviews {
    /// English name when known
    pub name: String,
    /// Products with at least one review
    pub reviewed: usize,
    /// Products in the category
    pub total: usize,
}

/// One seller's footprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerShare {
    /// Marketing name
    pub name: String,
    /// Products listed
    pub count: usize,
    /// Share of all products, percent
    pub share_pct: f64,
    /// Rating from the seller's first listing
    pub rating: Option<f64>,
}

/// Cumulative product share of the largest sellers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concentration {
    /// Number of top sellers
    pub top: usize,
    /// Percent of all products they list
    pub share_pct: f64,
}

/// Summary of a product catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogSummary {
    /// Products analysed
    pub total_products: usize,
    /// Categories by product count, largest first
    pub categories: Vec<CategoryCount>,
    /// Products per price tier, in tier order
    pub price_tiers: Vec<TierCount>,
    /// Products per discount tier, in tier order
    pub discount_tiers: Vec<TierCount>,
    /// Median retail price of priced products
    pub median_price: Option<f64>,
    /// Products per longest installment term, in [`INSTALLMENT_TERMS`] order
    pub installment_terms: Vec<InstallmentCount>,
    /// Products with a real brand
    pub branded: usize,
    /// Most common named brands, largest first
    pub top_brands: Vec<BrandCount>,
    /// Products with at least one review
    pub reviewed: usize,
    /// Review coverage of the largest categories, largest first
    pub category_reviews: Vec<CategoryReviews>,
    /// Mean discount among discounted products
    pub mean_discount: Option<f64>,
    /// Largest sellers by product count
    pub top_sellers: Vec<SellerShare>,
    /// Cumulative share of the top 5, 10, ... sellers
    pub concentration: Vec<Concentration>,
}

#[derive(Default)]
struct Bucket {
    count: usize,
    price_sum: f64,
    priced: usize,
    reviewed: usize,
}

impl Bucket {
    fn add(&mut self, price: Option<f64>) {
        self.count += 1;
        if let Some(price) = price.filter(|p| !p.is_nan()) {
            self.price_sum += price;
            self.priced += 1;
        }
    }

    fn avg_price(&self) -> Option<f64> {
        (self.priced > 0).then(|| self.price_sum / self.priced as f64)
    }
}

fn is_reviewed(record: &ProductRecord) -> bool {
    record.rating_value.is_some_and(|r| r > 0.0)
}

/// Median of `values`; the mean of the middle pair for even lengths.
fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Summarize in-memory records, keeping the `top_n` largest sellers.
pub fn summarize_records(records: &[ProductRecord], top_n: usize) -> CatalogSummary {
    let total = records.len();
    let mut categories: HashMap<String, Bucket> = HashMap::new();
    let mut price_tiers: HashMap<&'static str, Bucket> = HashMap::new();
    let mut discount_tiers: HashMap<&'static str, Bucket> = HashMap::new();
    let mut sellers: HashMap<&str, (usize, Option<f64>)> = HashMap::new();
    let mut brands: HashMap<&str, usize> = HashMap::new();
    let mut terms: HashMap<u32, usize> = HashMap::new();
    let mut prices = Vec::with_capacity(total);
    let mut branded = 0;
    let mut reviewed = 0;
    let mut discount_sum = 0.0;
    let mut discounted = 0;

    for record in records {
        if !record.category_name.is_empty() {
            let bucket = categories
                .entry(english_category(&record.category_name).to_string())
                .or_default();
            bucket.add(record.retail_price);
            if is_reviewed(record) {
                bucket.reviewed += 1;
            }
        }
        if let Some(price) = record.retail_price.filter(|p| !p.is_nan()) {
            prices.push(price);
        }
        if let Some(months) = record.max_installment_months {
            *terms.entry(months).or_default() += 1;
        }
        if let Some(tier) = record.retail_price.and_then(price_tier) {
            price_tiers.entry(tier).or_default().add(record.retail_price);
        }
        discount_tiers
            .entry(discount_tier(record.discount_pct))
            .or_default()
            .add(record.retail_price);

        if !record.seller_name.is_empty() {
            let entry = sellers
                .entry(record.seller_name.as_str())
                .or_insert((0, record.seller_rating));
            entry.0 += 1;
        }
        if has_brand(&record.brand) {
            branded += 1;
            *brands.entry(record.brand.as_str()).or_default() += 1;
        }
        if is_reviewed(record) {
            reviewed += 1;
        }
        if record.discount_pct > 0.0 {
            discount_sum += record.discount_pct;
            discounted += 1;
        }
    }

    let mut categories: Vec<(String, Bucket)> = categories.into_iter().collect();
    categories.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(&b.0)));

    let category_reviews = categories
        .iter()
        .take(REVIEW_CATEGORIES)
        .map(|(name, bucket)| CategoryReviews {
            name: name.clone(),
            reviewed: bucket.reviewed,
            total: bucket.count,
        })
        .collect();
    let categories: Vec<CategoryCount> = categories
        .into_iter()
        .map(|(name, bucket)| CategoryCount {
            avg_price: bucket.avg_price(),
            count: bucket.count,
            name,
        })
        .collect();

    let listed_terms: usize = INSTALLMENT_TERMS
        .iter()
        .map(|m| terms.get(m).copied().unwrap_or(0))
        .sum();
    let installment_terms = INSTALLMENT_TERMS
        .iter()
        .map(|&months| {
            let count = terms.get(&months).copied().unwrap_or(0);
            InstallmentCount {
                months,
                count,
                share_pct: if listed_terms == 0 {
                    0.0
                } else {
                    count as f64 / listed_terms as f64 * 100.0
                },
            }
        })
        .collect();

    let mut top_brands: Vec<BrandCount> = brands
        .into_iter()
        .map(|(name, count)| BrandCount {
            name: name.to_string(),
            count,
        })
        .collect();
    top_brands.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    top_brands.truncate(TOP_BRANDS);

    let tiers = |order: &[&'static str], buckets: &HashMap<&'static str, Bucket>| {
        order
            .iter()
            .map(|&label| {
                let bucket = buckets.get(label);
                TierCount {
                    label,
                    count: bucket.map_or(0, |b| b.count),
                    avg_price: bucket.and_then(Bucket::avg_price),
                }
            })
            .collect::<Vec<_>>()
    };

    let mut ranked: Vec<(&str, usize, Option<f64>)> = sellers
        .into_iter()
        .map(|(name, (count, rating))| (name, count, rating))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let share = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    };

    let concentration = CONCENTRATION_MILESTONES
        .iter()
        .map(|&top| Concentration {
            top,
            share_pct: share(ranked.iter().take(top).map(|s| s.1).sum()),
        })
        .collect();

    let top_sellers = ranked
        .iter()
        .take(top_n)
        .map(|&(name, count, rating)| SellerShare {
            name: name.to_string(),
            count,
            share_pct: share(count),
            rating,
        })
        .collect();

    debug!(
        categories = categories.len(),
        sellers = ranked.len(),
        "Summary computed"
    );

    CatalogSummary {
        total_products: total,
        categories,
        price_tiers: tiers(&PRICE_TIER_ORDER, &price_tiers),
        discount_tiers: tiers(&DISCOUNT_TIER_ORDER, &discount_tiers),
        median_price: median(prices),
        installment_terms,
        branded,
        top_brands,
        reviewed,
        category_reviews,
        mean_discount: (discounted > 0).then(|| discount_sum / discounted as f64),
        top_sellers,
        concentration,
    }
}

/// Read a product CSV and summarize it.
pub fn summarize_csv<P: AsRef<Path>>(path: P, top_n: usize) -> Result<CatalogSummary, ReportError> {
    let path = path.as_ref();
    info!("Loading products from {}", path.display());

    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize::<ProductRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    info!(products = records.len(), "Products loaded");

    Ok(summarize_records(&records, top_n))
}

impl CatalogSummary {
    fn pct(&self, count: usize) -> f64 {
        if self.total_products == 0 {
            0.0
        } else {
            count as f64 / self.total_products as f64 * 100.0
        }
    }

    /// Report for terminals.
    pub fn format_human(&self) -> String {
        let mut out = vec![format!("Products: {}", self.total_products)];

        out.push(String::from("\nTop categories:"));
        for category in self.categories.iter().take(15) {
            out.push(format!(
                "  {:<32} {:>7}  avg {}",
                category.name,
                category.count,
                format_price(category.avg_price)
            ));
        }

        if let Some(median) = self.median_price {
            out.push(format!("\nCatalog median price: {median:.2} AZN"));
        }

        out.push(String::from("\nPrice tiers (AZN):"));
        for tier in &self.price_tiers {
            out.push(format!("  {:<12} {:>7}", tier.label, tier.count));
        }

        out.push(String::from("\nDiscount tiers:"));
        for tier in &self.discount_tiers {
            out.push(format!(
                "  {:<12} {:>7}  avg {}",
                tier.label,
                tier.count,
                format_price(tier.avg_price)
            ));
        }

        out.push(String::from("\nInstallment terms:"));
        for term in &self.installment_terms {
            out.push(format!(
                "  {:<12} {:>7}  {:>5.1}%",
                term.label(),
                term.count,
                term.share_pct
            ));
        }

        out.push(format!(
            "\nBranded: {} ({:.1}%)  |  Reviewed: {} ({:.1}%)",
            self.branded,
            self.pct(self.branded),
            self.reviewed,
            self.pct(self.reviewed)
        ));
        if let Some(mean) = self.mean_discount {
            out.push(format!("Mean discount when discounted: {mean:.1}%"));
        }

        out.push(String::from("\nTop brands:"));
        for brand in &self.top_brands {
            out.push(format!("  {:<32} {:>7}", brand.name, brand.count));
        }

        out.push(String::from("\nReview coverage by category:"));
        for category in &self.category_reviews {
            out.push(format!(
                "  {:<32} {:>7} / {}",
                category.name, category.reviewed, category.total
            ));
        }

        out.push(String::from("\nTop sellers:"));
        for seller in &self.top_sellers {
            out.push(format!(
                "  {:<32} {:>7}  {:>5.1}%",
                seller.name, seller.count, seller.share_pct
            ));
        }

        out.push(String::from("\nSeller concentration:"));
        for point in &self.concentration {
            out.push(format!("  Top {:<3} {:>5.1}%", point.top, point.share_pct));
        }

        out.join("\n")
    }
}

fn format_price(price: Option<f64>) -> String {
    price.map_or_else(|| "-".to_string(), |p| format!("{p:.2}"))
}
