//! Gamma correction lookup table

/// Precomputed 256-entry gamma table, `out = (i/255)^(1/gamma) * 255`
#[derive(Debug, Clone)]
pub struct GammaTable {
    table: [u8; 256],
}

impl GammaTable {
    pub fn new(gamma: f64) -> Self {
        let mut table = [0u8; 256];
        for (i, out) in table.iter_mut().enumerate() {
            // truncation, matching an 8-bit cast of the float result
            *out = ((i as f64 / 255.0).powf(1.0 / gamma) * 255.0) as u8;
        }
        Self { table }
    }

    pub fn lookup(&self, value: u8) -> u8 {
        self.table[value as usize]
    }

    /// Map every byte in place
    pub fn apply(&self, data: &mut [u8]) {
        for byte in data {
            *byte = self.table[*byte as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_fixed() {
        let table = GammaTable::new(1.4);
        assert_eq!(table.lookup(0), 0);
        assert_eq!(table.lookup(255), 255);
    }

    #[test]
    fn test_unit_gamma_is_identity() {
        let table = GammaTable::new(1.0);
        for i in 0..=255u8 {
            // float rounding may land one below
            assert!(i - table.lookup(i) <= 1, "{} -> {}", i, table.lookup(i));
        }
    }

    #[test]
    fn test_brightens_and_stays_monotone() {
        let table = GammaTable::new(1.4);
        assert_eq!(table.lookup(128), 155);
        for i in 1..=255u8 {
            assert!(table.lookup(i) >= table.lookup(i - 1));
            assert!(table.lookup(i) >= i);
        }

        let mut data = vec![128u8, 0, 255];
        table.apply(&mut data);
        assert_eq!(data, vec![155, 0, 255]);
    }
}
