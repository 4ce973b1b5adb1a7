use bitflags::bitflags;

bitflags! {
    /// Attributes on method definitions
    ///
    /// The member access values occupy the low three bits and are not independent flags: test
    /// them with [`MethodAttributes::member_access`] rather than `contains`.
    ///
    /// [0]: ECMA-335, partition II, 23.1.10
    pub struct MethodAttributes: u16 {
        const COMPILER_CONTROLLED = 0x0000;
        const PRIVATE = 0x0001;
        const FAM_AND_ASSEM = 0x0002;
        const ASSEMBLY = 0x0003;
        const FAMILY = 0x0004;
        const FAM_OR_ASSEM = 0x0005;
        const PUBLIC = 0x0006;
        const STATIC = 0x0010;
        const FINAL = 0x0020;
        const VIRTUAL = 0x0040;
        const HIDE_BY_SIG = 0x0080;
        const NEW_SLOT = 0x0100;
        const STRICT = 0x0200;
        const ABSTRACT = 0x0400;
        const SPECIAL_NAME = 0x0800;
        const PINVOKE_IMPL = 0x2000;
        const UNMANAGED_EXPORT = 0x0008;
        const RT_SPECIAL_NAME = 0x1000;
        const HAS_SECURITY = 0x4000;
        const REQUIRE_SEC_OBJECT = 0x8000;
    }
}

impl MethodAttributes {
    const MEMBER_ACCESS_MASK: u16 = 0x0007;

    /// Just the member access bits
    pub fn member_access(self) -> MethodAttributes {
        MethodAttributes::from_bits_truncate(self.bits() & Self::MEMBER_ACCESS_MASK)
    }

    /// Does the method take an implicit `this` argument?
    pub fn has_this(self) -> bool {
        !self.contains(MethodAttributes::STATIC)
    }
}

bitflags! {
    /// Attributes on parameters
    ///
    /// [0]: ECMA-335, partition II, 23.1.13
    pub struct ParameterAttributes: u16 {
        const IN = 0x0001;
        const OUT = 0x0002;
        const OPTIONAL = 0x0010;
        const HAS_DEFAULT = 0x1000;
        const HAS_FIELD_MARSHAL = 0x2000;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn member_access_is_masked() {
        let attrs =
            MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::HIDE_BY_SIG;
        assert_eq!(attrs.member_access(), MethodAttributes::PUBLIC);
        assert!(!attrs.has_this());
        assert!((MethodAttributes::PRIVATE | MethodAttributes::VIRTUAL).has_this());
    }
}
