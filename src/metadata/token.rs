use std::fmt;

/// Metadata table a token points into (the top byte of the token)
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum TokenType {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    Field = 0x04,
    Method = 0x06,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0a,
    Signature = 0x11,
    Property = 0x17,
    ModuleRef = 0x1a,
    TypeSpec = 0x1b,
    Assembly = 0x20,
    AssemblyRef = 0x23,
    GenericParam = 0x2a,
    MethodSpec = 0x2b,
    String = 0x70,
}

impl TokenType {
    const ALL: [TokenType; 17] = [
        TokenType::Module,
        TokenType::TypeRef,
        TokenType::TypeDef,
        TokenType::Field,
        TokenType::Method,
        TokenType::Param,
        TokenType::InterfaceImpl,
        TokenType::MemberRef,
        TokenType::Signature,
        TokenType::Property,
        TokenType::ModuleRef,
        TokenType::TypeSpec,
        TokenType::Assembly,
        TokenType::AssemblyRef,
        TokenType::GenericParam,
        TokenType::MethodSpec,
        TokenType::String,
    ];

    pub fn from_table(table: u8) -> Option<TokenType> {
        TokenType::ALL.iter().copied().find(|ty| *ty as u8 == table)
    }
}

/// A 32-bit metadata token: table in the top byte, row id (1-based) in the low 24 bits
///
/// The zero token is the "no token" value (eg. a method body without a local signature).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct MetadataToken(pub u32);

impl MetadataToken {
    pub const ZERO: MetadataToken = MetadataToken(0);

    const RID_MASK: u32 = 0x00ff_ffff;

    pub fn new(token_type: TokenType, rid: u32) -> MetadataToken {
        MetadataToken(((token_type as u32) << 24) | (rid & Self::RID_MASK))
    }

    /// Row id in the table
    pub fn rid(self) -> u32 {
        self.0 & Self::RID_MASK
    }

    /// Table the token points into, if it is a known one
    pub fn token_type(self) -> Option<TokenType> {
        TokenType::from_table((self.0 >> 24) as u8)
    }

    pub fn is_zero(self) -> bool {
        self.rid() == 0
    }
}

impl From<u32> for MetadataToken {
    fn from(raw: u32) -> MetadataToken {
        MetadataToken(raw)
    }
}

impl fmt::Debug for MetadataToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token_type() {
            Some(token_type) => write!(f, "[{:?}:0x{:04x}]", token_type, self.rid()),
            None => write!(f, "[0x{:08x}]", self.0),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_table_and_rid() {
        let token = MetadataToken::new(TokenType::MemberRef, 0x12);
        assert_eq!(token.0, 0x0a00_0012);
        assert_eq!(token.rid(), 0x12);
        assert_eq!(token.token_type(), Some(TokenType::MemberRef));
        assert_eq!(format!("{:?}", token), "[MemberRef:0x0012]");
    }

    #[test]
    fn zero_token() {
        assert!(MetadataToken::ZERO.is_zero());
        assert!(MetadataToken::new(TokenType::Signature, 0).is_zero());
        assert!(!MetadataToken::from(0x1100_0001).is_zero());
        assert_eq!(MetadataToken(0x4200_0001).token_type(), None);
    }
}
