//! Macros to reduce boilerplate in the codebase

/// Generate `Display` and case-insensitive `FromStr` implementations for enums.
///
/// Each variant has one canonical label (used by `Display`) and any number of
/// extra spellings accepted by `FromStr`.
///
/// # Usage
///
/// ```rust,ignore
/// enum_display_fromstr!(
///     MyEnum,
///     DeskError::InvalidMyEnum,
///     {
///         Variant1 => "Variant One" | "variant_one",
///         Variant2 => "Variant Two",
///     }
/// );
/// ```
macro_rules! enum_display_fromstr {
    (
        $enum_name:ident,
        $error_variant:path,
        { $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($enum_name::$variant => f.pad($label),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::error::DeskError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if ::unicase::eq_ascii(trimmed, $label)
                        $(|| ::unicase::eq_ascii(trimmed, $alias))*
                    {
                        return Ok($enum_name::$variant);
                    }
                )+
                Err($error_variant(s.to_string()))
            }
        }
    };
}
