//! XML documents shared by the integration tests.

/// A persistence configuration with its DTD inlined.
pub const CONFIGURATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE configuration [
  <!ELEMENT configuration (properties?, settings?, environments, mappers?)>
  <!ELEMENT properties (property*)>
  <!ATTLIST properties resource CDATA #IMPLIED>
  <!ELEMENT property EMPTY>
  <!ATTLIST property name CDATA #REQUIRED value CDATA #REQUIRED>
  <!ELEMENT settings (setting+)>
  <!ELEMENT setting EMPTY>
  <!ATTLIST setting name CDATA #REQUIRED value CDATA #REQUIRED>
  <!ELEMENT environments (environment+)>
  <!ATTLIST environments default IDREF #REQUIRED>
  <!ELEMENT environment (transactionManager, dataSource)>
  <!ATTLIST environment id ID #REQUIRED>
  <!ELEMENT transactionManager EMPTY>
  <!ATTLIST transactionManager type (JDBC|MANAGED) "JDBC">
  <!ELEMENT dataSource (property*)>
  <!ATTLIST dataSource type (UNPOOLED|POOLED|JNDI) #REQUIRED>
  <!ELEMENT mappers (mapper*)>
  <!ELEMENT mapper EMPTY>
  <!ATTLIST mapper resource CDATA #REQUIRED>
]>
<configuration>
  <properties resource="db.properties">
    <property name="driver" value="${driver}"/>
    <property name="url" value="${url}"/>
  </properties>
  <settings>
    <setting name="cacheEnabled" value="true"/>
    <setting name="defaultStatementTimeout" value="25"/>
    <setting name="defaultFetchSize" value="${pool.max}"/>
    <setting name="loadFactor" value="0.75f"/>
  </settings>
  <environments default="development">
    <environment id="development">
      <transactionManager/>
      <dataSource type="POOLED">
        <property name="driver" value="${driver}"/>
        <property name="username" value="${username}"/>
        <property name="poolMaximumActiveConnections" value="${pool.max}"/>
      </dataSource>
    </environment>
    <environment id="test">
      <transactionManager type="MANAGED"/>
      <dataSource type="UNPOOLED">
        <property name="driver" value="org.hsqldb.jdbcDriver"/>
      </dataSource>
    </environment>
  </environments>
  <mappers>
    <mapper resource="org/example/BlogMapper.xml"/>
    <mapper resource="org/example/AuthorMapper.xml"/>
  </mappers>
</configuration>"#;

/// The DTD of [`CONFIGURATION`] as a standalone external subset.
pub const CONFIGURATION_DTD: &str = r#"<!-- persistence configuration -->
<!ELEMENT configuration (properties?, environments)>
<!ELEMENT properties (property*)>
<!ELEMENT property EMPTY>
<!ATTLIST property name CDATA #REQUIRED value CDATA #REQUIRED>
<!ELEMENT environments (environment+)>
<!ATTLIST environments default CDATA #REQUIRED>
<!ELEMENT environment EMPTY>
<!ATTLIST environment id CDATA #REQUIRED pooled (true|false) "true">
"#;

pub const CONFIGURATION_PUBLIC_ID: &str = "-//example//DTD Config 3.0//EN";

/// A document that refers to [`CONFIGURATION_DTD`] by public and system id.
pub fn external_configuration(body: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<!DOCTYPE configuration PUBLIC "{}" "http://example.org/dtd/config.dtd">
<configuration>{}</configuration>"#,
        CONFIGURATION_PUBLIC_ID, body
    )
}

/// Nested entities that expand to 10^9 copies of one string.
pub const BILLION_LAUGHS: &str = r#"<?xml version="1.0"?>
<!DOCTYPE lolz [
  <!ENTITY lol "lol">
  <!ENTITY lol1 "&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;">
  <!ENTITY lol2 "&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;">
  <!ENTITY lol3 "&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;&lol2;">
  <!ENTITY lol4 "&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;&lol3;">
  <!ENTITY lol5 "&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;&lol4;">
  <!ENTITY lol6 "&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;&lol5;">
  <!ENTITY lol7 "&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;&lol6;">
  <!ENTITY lol8 "&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;&lol7;">
  <!ENTITY lol9 "&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;&lol8;">
]>
<lolz>&lol9;</lolz>"#;
