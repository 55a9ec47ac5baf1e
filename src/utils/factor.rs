//! Radix selection for multi-round exchanges.

/// Prime factors of `n` in ascending order.
pub fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            out.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        out.push(n);
    }
    out
}

/// Factor `n` into radices whose product is `n`, packing prime factors into
/// groups no larger than `target` (first-fit, largest primes first). A prime
/// above `target` becomes a radix of its own. `n <= 1` needs no rounds.
pub fn radix_factors(n: usize, target: usize) -> Vec<usize> {
    let target = target.max(2);
    let mut radices: Vec<usize> = Vec::new();
    for p in prime_factors(n).into_iter().rev() {
        match radices.iter_mut().find(|r| **r * p <= target) {
            Some(r) => *r *= p,
            None => radices.push(p),
        }
    }
    radices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factors_multiply_back() {
        for n in 1..200 {
            for target in [2, 4, 8, 16] {
                let f = radix_factors(n, target);
                assert_eq!(f.iter().product::<usize>(), n.max(1));
            }
        }
    }

    #[test]
    fn packing() {
        assert_eq!(radix_factors(8, 8), vec![8]);
        assert_eq!(radix_factors(12, 8), vec![6, 2]);
        assert_eq!(radix_factors(64, 8), vec![8, 8]);
        assert_eq!(radix_factors(7, 4), vec![7]);
        assert!(radix_factors(1, 8).is_empty());
        assert_eq!(prime_factors(360), vec![2, 2, 2, 3, 3, 5]);
    }
}
