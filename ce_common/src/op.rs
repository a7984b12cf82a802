/// Implements the standard arithmetic operator traits for single-field tuple structs.
#[macro_export]
macro_rules! op {
    (binary $ty:ty, $trait:ident, $fn:ident) => {
        impl $trait for $ty {
            type Output = Self;

            fn $fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$fn(rhs.0))
            }
        }
    };
    (inplace $ty:ty, $trait:ident, $fn:ident) => {
        impl $trait for $ty {
            fn $fn(&mut self, rhs: Self) {
                self.0.$fn(rhs.0);
            }
        }
    };
    (unary $ty:ty, $trait:ident, $fn:ident) => {
        impl $trait for $ty {
            type Output = Self;

            fn $fn(self) -> Self::Output {
                Self(self.0.$fn())
            }
        }
    };
}
