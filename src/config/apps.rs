//! App name to package name mapping for supported applications.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Mapping from app display names (lowercase) to Android package names.
pub static APP_PACKAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    // Shopping
    m.insert("amazon", "in.amazon.mShop.android.shopping");
    m.insert("flipkart", "com.flipkart.android");
    m.insert("myntra", "com.myntra.android");
    m.insert("meesho", "com.meesho.supply");
    m.insert("blinkit", "com.grofers.customerapp");
    m.insert("zepto", "com.zeptoconsumerapp");
    m.insert("bigbasket", "com.bigbasket.mobileapp");

    // Food delivery
    m.insert("swiggy", "in.swiggy.android");
    m.insert("zomato", "com.application.zomato");

    // Rides
    m.insert("uber", "com.ubercab");
    m.insert("ola", "com.olacabs.customer");
    m.insert("rapido", "com.rapido.passenger");

    // Messaging
    m.insert("whatsapp", "com.whatsapp");
    m.insert("whatsapp business", "com.whatsapp.w4b");
    m.insert("telegram", "org.telegram.messenger");
    m.insert("messages", "com.google.android.apps.messaging");
    m.insert("gmail", "com.google.android.gm");

    // System & Google
    m.insert("settings", "com.android.settings");
    m.insert("android system settings", "com.android.settings");
    m.insert("chrome", "com.android.chrome");
    m.insert("google chrome", "com.android.chrome");
    m.insert("maps", "com.google.android.apps.maps");
    m.insert("google maps", "com.google.android.apps.maps");
    m.insert("youtube", "com.google.android.youtube");
    m.insert("play store", "com.android.vending");
    m.insert("contacts", "com.google.android.contacts");
    m.insert("phone", "com.google.android.dialer");
    m.insert("camera", "com.android.camera2");
    m.insert("calendar", "com.google.android.calendar");
    m.insert("clock", "com.google.android.deskclock");
    m.insert("calculator", "com.google.android.calculator");
    m.insert("photos", "com.google.android.apps.photos");
    m.insert("files", "com.google.android.documentsui");

    // Payments
    m.insert("paytm", "net.one97.paytm");
    m.insert("phonepe", "com.phonepe.app");
    m.insert("google pay", "com.google.android.apps.nbu.paisa.user");

    m
});

/// Get the package name for an app by its display name (case-insensitive).
pub fn get_package(app_name: &str) -> Option<&'static str> {
    APP_PACKAGES
        .get(app_name.trim().to_lowercase().as_str())
        .copied()
}

/// Resolve an app reference to a package name.
///
/// Known display names map through [`APP_PACKAGES`]; anything that already
/// looks like a package (`com.example.app`) is passed through.
pub fn resolve_package(app: &str) -> Option<String> {
    if let Some(package) = get_package(app) {
        return Some(package.to_string());
    }
    let app = app.trim();
    let looks_like_package = app.contains('.')
        && !app.contains(char::is_whitespace)
        && app.split('.').all(|seg| !seg.is_empty());
    looks_like_package.then(|| app.to_string())
}
