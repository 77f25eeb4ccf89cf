//! Maps provider signals onto the fixed expense taxonomy.
//!
//! Resolution order for a feed transaction:
//! 1. a known merchant key contained in the merchant/display name,
//! 2. the provider's detailed category code,
//! 3. the provider's primary category code,
//! 4. [`FALLBACK_CATEGORY`].
//!
//! Everything here is pure; the same input always yields the same category.

use common::FeedTransaction;

pub const FALLBACK_CATEGORY: &str = "Miscellaneous";
pub const INCOME_CATEGORY: &str = "Income";

/// The taxonomy every stored expense category is drawn from.
pub const CATEGORIES: &[&str] = &[
    "Restaurant and Takeout (Non-Social)",
    "Shoes and Clothing",
    "Groceries",
    "Alcohol",
    "Entertainment",
    "Utilities",
    "Sports and Fitness",
    "Haircuts and Cosmetics",
    "Airplane Flights",
    "Hotel and Lodging",
    "Car-Related Expenses (excluding gasoline)",
    "Taxi and Ride-Sharing",
    "Gasoline",
    "Household Goods",
    "Other Transportation Expenses",
    "Healthcare and Medical",
    "Gifts and Donations",
    "Software and Electronics",
    "Education (including student loans)",
    "Internet, Cell Phone, and TV",
    "Miscellaneous",
    "Restaurant and Takeout (Social)",
    "Rent",
    "Interest and Banking Fees",
    "Car and Renters Insurance",
    "Other Memberships and Fees",
    "Mortgage Insurance",
    "Homeowners Insurance",
    "Property Taxes",
    "Mortgage Principal and Interest",
    "Home Services",
    "Capital Improvements",
    "Landlord Expenses",
    INCOME_CATEGORY,
];

/// Categories that represent money coming in rather than spending.
const INCOME_CATEGORIES: &[&str] = &[INCOME_CATEGORY];

/// Merchants categorized directly, whatever the provider says.
/// Matched as an upper-case substring, first hit wins.
const MERCHANT_RULES: &[(&str, &str)] = &[
    ("UBER", "Taxi and Ride-Sharing"),
    ("LYFT", "Taxi and Ride-Sharing"),
    ("NETFLIX", "Entertainment"),
    ("SPOTIFY", "Entertainment"),
    ("AMAZON PRIME", "Other Memberships and Fees"),
    ("AIRBNB", "Hotel and Lodging"),
];

type NameExtractor = fn(&FeedTransaction) -> Option<&str>;

fn provider_merchant_name(transaction: &FeedTransaction) -> Option<&str> {
    transaction.merchant_name.as_deref()
}

fn provider_display_name(transaction: &FeedTransaction) -> Option<&str> {
    transaction.name.as_deref()
}

/// Candidate name sources, in priority order. The first non-blank one is used.
const NAME_EXTRACTORS: &[NameExtractor] = &[provider_merchant_name, provider_display_name];

/// Category verdict for a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorization {
    pub category: &'static str,
    pub is_income: bool,
}

/// Whether `category` counts as income. Recomputed on every category write.
pub fn is_income(category: &str) -> bool {
    INCOME_CATEGORIES.contains(&category)
}

pub fn is_known_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

/// The name used for merchant matching.
pub fn merchant_label(transaction: &FeedTransaction) -> Option<&str> {
    NAME_EXTRACTORS
        .iter()
        .filter_map(|extract| extract(transaction))
        .map(str::trim)
        .find(|name| !name.is_empty())
}

fn category_for_merchant(name: &str) -> Option<&'static str> {
    let upper = name.to_uppercase();
    MERCHANT_RULES
        .iter()
        .find(|(key, _)| upper.contains(key))
        .map(|(_, category)| *category)
}

fn category_for_exact_code(code: &str) -> Option<&'static str> {
    let category = match code {
        // Food & drink
        "FOOD_AND_DRINK" => "Groceries",
        "FOOD_AND_DRINK_RESTAURANTS" | "FOOD_AND_DRINK_RESTAURANT" => {
            "Restaurant and Takeout (Non-Social)"
        }
        "FOOD_AND_DRINK_COFFEE" | "FOOD_AND_DRINK_FAST_FOOD" => "Restaurant and Takeout (Non-Social)",
        "FOOD_AND_DRINK_GROCERY" | "FOOD_AND_DRINK_GROCERIES" => "Groceries",
        "FOOD_AND_DRINK_ALCOHOL" | "FOOD_AND_DRINK_BEER_WINE_AND_LIQUOR" => "Alcohol",

        // Transportation
        "TRANSPORTATION" | "TRANSPORTATION_PUBLIC_TRANSIT" => "Other Transportation Expenses",
        "TRANSPORTATION_TAXI" | "TRANSPORTATION_TAXIS_AND_RIDE_SHARES" => "Taxi and Ride-Sharing",
        "TRANSPORTATION_PARKING" | "TRANSPORTATION_CAR_SERVICE" => {
            "Car-Related Expenses (excluding gasoline)"
        }
        "TRANSPORTATION_GAS" => "Gasoline",

        // Travel
        "TRAVEL" => "Other Transportation Expenses",
        "TRAVEL_FLIGHTS" => "Airplane Flights",
        "TRAVEL_LODGING" => "Hotel and Lodging",
        "TRAVEL_RENTAL_CAR" | "TRAVEL_RENTAL_CARS" => "Car-Related Expenses (excluding gasoline)",

        // Shopping
        "SHOPPING" => "Miscellaneous",
        "SHOPPING_CLOTHING" => "Shoes and Clothing",
        "SHOPPING_ELECTRONICS" => "Software and Electronics",
        "SHOPPING_SPORTING_GOODS" => "Sports and Fitness",
        "SHOPPING_HOME_IMPROVEMENT" => "Household Goods",

        // Home
        "HOME" | "HOME_FURNITURE" => "Household Goods",
        "HOME_RENT" => "Rent",
        "HOME_MORTGAGE" => "Mortgage Principal and Interest",
        "HOME_IMPROVEMENT" => "Capital Improvements",
        "HOME_MAINTENANCE" => "Home Services",
        "HOME_INSURANCE" => "Homeowners Insurance",
        "HOME_PROPERTY_TAXES" => "Property Taxes",

        "ENTERTAINMENT" => "Entertainment",
        "PERSONAL_CARE" => "Haircuts and Cosmetics",
        "MEDICAL" => "Healthcare and Medical",
        "HEALTH_FITNESS" => "Sports and Fitness",

        "PROFESSIONAL_SERVICES" => "Miscellaneous",
        "PROFESSIONAL_SERVICES_EDUCATION" => "Education (including student loans)",

        // Utilities
        "UTILITIES" => "Utilities",
        "UTILITIES_INTERNET" | "UTILITIES_PHONE" | "UTILITIES_TELEVISION" => {
            "Internet, Cell Phone, and TV"
        }

        "INSURANCE" => "Car and Renters Insurance",
        "FEES_AND_CHARGES" => "Interest and Banking Fees",
        "LOAN" => "Education (including student loans)",

        "INCOME" | "INCOME_DIVIDENDS" | "INCOME_WAGES" | "INCOME_INTEREST_EARNED" => INCOME_CATEGORY,

        "GENERAL_SERVICES" | "GENERAL_MERCHANDISE" | "UNCATEGORIZED" => "Miscellaneous",
        _ => return None,
    };
    Some(category)
}

/// Looks a provider code up exactly, then by its root token before the first `_`.
pub fn category_for_code(code: &str) -> Option<&'static str> {
    category_for_exact_code(code).or_else(|| {
        code.split_once('_')
            .and_then(|(root, _)| category_for_exact_code(root))
    })
}

/// Picks the category for a feed transaction.
pub fn categorize(transaction: &FeedTransaction) -> Categorization {
    let category = merchant_label(transaction)
        .and_then(category_for_merchant)
        .or_else(|| {
            let pfc = transaction.personal_finance_category.as_ref()?;
            [pfc.detailed.as_deref(), pfc.primary.as_deref()]
                .into_iter()
                .flatten()
                .find_map(category_for_code)
        })
        .unwrap_or(FALLBACK_CATEGORY);

    Categorization {
        category,
        is_income: is_income(category),
    }
}
