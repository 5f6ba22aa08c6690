/// Whether untyped CSV cells are narrowed to bool/int/float.
/// Cells named by a schema are always coerced to the declared type instead.
pub const DEFAULT_INFER_CSV_SCALARS: bool = true;
