mod google;
mod interface;

pub use google::GoogleTranslator;
pub use interface::Translator;
